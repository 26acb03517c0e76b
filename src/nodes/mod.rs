pub mod copier;
pub mod generator;
pub mod tracer;

pub use copier::Copier;
pub use generator::Generator;
pub use tracer::Tracer;
