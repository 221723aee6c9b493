// Application state for HTTP handlers
use crate::application::dataset_service::DatasetService;
use crate::application::simulation_service::SimulationService;

#[derive(Clone)]
pub struct AppState {
    pub simulation_service: SimulationService,
    pub dataset_service: DatasetService,
}
