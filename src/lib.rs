pub mod labels;
pub mod predict;
pub mod preprocess;
pub mod server;
pub mod settings;
pub mod torch;
