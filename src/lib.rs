//! # Site Budget Library
//!
//! Questa libreria mantiene il peso dell'albero di un sito statico entro il
//! budget: i file troppo grandi vengono cancellati, i sottoalberi obsoleti
//! rimossi e le immagini raster ri-codificate (resize-fit, qualità per
//! formato) o convertite in WebP quando conviene.
//!
//! ## Architettura dei moduli:
//! - `config`: tabelle di configurazione, default e validazione
//! - `error`: tassonomia degli errori per le operazioni sul singolo file
//! - `asset`: classificazione immagine/vettoriale e `Format`
//! - `file_manager`: visita dell'albero, dimensioni, replace atomico
//! - `policy`: decisioni pure (cancella, ri-codifica, converti, salta)
//! - `resize`: geometria fit-inside
//! - `image_processor`: il trait `Codec` e la sua implementazione
//! - `optimizer`: executor di transcodifica e fase di ottimizzazione parallela
//! - `cleanup`: sweep per dimensione, prune, sweep dei temporanei
//! - `outcome`: esiti per file
//! - `progress`: contabilità per fase, progress bar e writer dei log
//! - `json_output`: righe di output `--json`
//! - `runner`: sequenza delle fasi per ogni comando
//!
//! ## Utilizzo:
//! ```ignore
//! use site_budget::{Config, Runner};
//!
//! let config = Config::from_file(&Config::locate(&root)).await?;
//! let report = Runner::new(&root, config).all().await?;
//! println!("{}", report.total().format_summary());
//! ```

pub mod asset;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod outcome;
pub mod policy;
pub mod progress;
pub mod resize;
pub mod runner;

pub use config::Config;
pub use error::BudgetError;
pub use optimizer::{MediaOptimizer, TaskOptimizer};
pub use outcome::{ActionResult, SkipReason};
pub use progress::{PhaseReport, RunReport, RunSummary};
pub use runner::{OutputMode, Runner};
