pub mod coordinates;
pub mod dataset_loader;
pub mod energy_service;
pub mod nsrdb_service;
pub mod solar_algorithm;
