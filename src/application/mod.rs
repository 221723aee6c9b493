// Application layer - use cases over the domain
pub mod dataset_service;
pub mod process_supervisor;
pub mod simulation_service;
