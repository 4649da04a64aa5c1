// Inference engine clients.

pub mod diffusion;
pub mod echo;

pub use diffusion::HttpDiffusionEngine;
pub use echo::EchoEngine;
