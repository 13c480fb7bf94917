//! # Optimizer Module
//!
//! La fase di ottimizzazione, divisa in:
//! - `media_optimizer`: pool di worker limitato su una root
//! - `task_optimizer`: l'executor di transcodifica per singolo file
//! - `path_resolver`: nomi dei file fratelli e temporanei

pub mod media_optimizer;
pub mod path_resolver;
pub mod task_optimizer;

pub use media_optimizer::MediaOptimizer;
pub use path_resolver::PathResolver;
pub use task_optimizer::{ExecutorOptions, TaskOptimizer};
