//! Data layer: core types, file IO, and splitting.
//!
//! Architecture:
//! ```text
//!  .csv / .tab / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Table, Table → split CSV
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  model    │  columns, rows of CellValue, `Y` labels
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  split    │  random / scaffold / cold → SplitBundle
//!   └──────────┘
//!        │ (scaffold keys)
//!        ▼
//!   ┌──────────┐
//!   │ scaffold  │  SMILES → Murcko-style framework key
//!   └──────────┘
//! ```

pub mod loader;
pub mod model;
pub mod scaffold;
pub mod split;

pub use model::{CellValue, LABEL_COLUMN, Table};
pub use split::{SplitBundle, SplitMethod, SplitPolicy};
