pub mod solar_controller;
