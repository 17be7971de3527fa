// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! The pre-compiled graph description consumed by the runtime.
//!
//! A graph is a table of **paths**. Each path is an ordered list of
//! **calls** (operator invocations addressed by variable and attribute ids)
//! plus the ids of the paths it waits for and the paths it unblocks. The
//! lifetime schedule is baked in ahead of time: `delete` calls and the
//! `clean` list say exactly when each variable slot is released.
//!
//! - [`parse`]: reads the line-oriented `main.cnx` text.
//! - [`GraphDef`]: the graph, with a **type-state pattern**
//!   (`Parsed` → `Validated`).
//! - [`PathDef`], [`CallDef`], [`CallKind`]: the path table entries.
//!
//! # Example
//! ```
//! let text = "opset 13\npaths 1\ninitializers 1\nvariables 1\n\
//!             path 0\ncall Relu 1 1 0 1 0\noutputs\nstart 0\nstop 0\n";
//! let graph = graph_ir::parse(text).unwrap().validate().unwrap();
//! assert_eq!(graph.num_paths(), 1);
//! println!("{}", graph.summary());
//! ```

mod error;
pub mod graph;
mod parser;
mod path;

pub use error::GraphError;
pub use graph::{GraphDef, GraphSummary, Parsed, Validated};
pub use parser::parse;
pub use path::{CallDef, CallKind, PathDef};
