//! `seqrun` is a crate for processing finished sequencing runs.
//!
//! Once a sequencer signals that a run's primary analysis is complete, the
//! run is demultiplexed into per-sample read files, quality control
//! statistics are generated, and the results are distributed to three
//! destinations: a cloud share (per project, for the customers who own the
//! samples), an HPC cluster, and a long-term archive.
//!
//! The crate provides a few layers that can be used independently:
//!
//! - [`SampleSheet`] parses, normalizes, and losslessly rewrites sample
//!   sheets, including reverse complementing index reads.
//! - [`probe`] decides whether (and in which index orientation) a run can be
//!   demultiplexed by trying it on a subset of the data.
//! - [`pipeline`] drives a [`Run`] through every stage, persisting progress
//!   in a [status record](crate::status) so that a failed run resumes where
//!   it left off once an operator releases it.
//!
//! Every external program and service (the demultiplexer, the statistics
//! tools, the copy programs, the LIMS, and mail) sits behind a trait in
//! [`tools`], configured through a [`Config`](config::Config).
//!
//! ## Sample sheets
//!
//! ```
//! use seqrun::SampleSheet;
//!
//! let data = "[Data]\nSample_ID,index,index2,Sample_Project\nS1,ACGTN,AACC,P1\nS2,TTGA,GGTT,P2\n";
//! let mut sheet = data.parse::<SampleSheet>()?;
//!
//! // Stray unknown bases are stripped when more than one sample shares the
//! // run.
//! assert!(sheet.strip_unknown_bases());
//! assert_eq!(sheet.samples().first().index().to_string(), "ACGT");
//!
//! let reverse = sheet.reverse_complemented();
//! assert_eq!(reverse.reversed_index_name(), "index2");
//! assert_eq!(reverse.samples().first().index2().to_string(), "GGTT");
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Processing runs
//!
//! ```no_run
//! use seqrun::config::Config;
//! use seqrun::pipeline;
//! use seqrun::pipeline::Context;
//! use seqrun::tools::Toolbox;
//!
//! let config = Config::from_path("seqrun.toml")?;
//! let tools = Toolbox::from_config(&config)?;
//! let context = Context::new(config, tools);
//!
//! let summary = pipeline::run_once(&context);
//! println!("{summary}");
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod checksum;
pub mod config;
pub mod conversion;
pub mod pipeline;
pub mod probe;
pub mod reports;
pub mod run;
pub mod run_log;
pub mod sample_sheet;
pub mod status;
pub mod tools;
pub mod transfer;

pub use run::Run;

pub use self::sample_sheet::SampleSheet;
