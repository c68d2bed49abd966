// Agents - long-running chat and scheduler loops
pub mod agents;

// Indicator computation
pub mod feature_engineering_service;

// Model inference and dataset labelling
pub mod ml;

// Signal analysis, pair selection and ranking
pub mod signals;

// System orchestrator
pub mod system;
