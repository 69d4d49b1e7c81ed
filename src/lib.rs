//! A Rust client for the O2A observation registry and data web service.
//!
//! This crate abstracts access to metadata stored in
//! <https://registry.o2a-data.de> and to measurement data served by
//! <https://dashboard.awi.de/data/>, in the manner of the Python
//! `o2a-data-dws` modules: resolve an item by hierarchical code or numeric
//! id, then walk the registry's UUID-back-referenced response trees into
//! normalized platform/sensor/parameter records. Aggregated time series
//! come from the data web service as tabular rows.
//!
//! ## Quick start
//! ```no_run
//! use o2a::Client;
//!
//! fn main() -> o2a::Result<()> {
//!     let client = Client::from_env()?;
//!
//!     let tree = client.detailed_tree("vessel:polarstern:pco2_go_ps")?;
//!     for (urn, parameter) in &tree.parameters {
//!         println!("{urn}: {} [{}]", parameter.name, parameter.unit);
//!     }
//!
//!     let position = client.geolocation("vessel:polarstern:pco2_go_ps", Some(&["Deployment"]))?;
//!     println!("{:?} / {:?}", position.latitude, position.longitude);
//!     Ok(())
//! }
//! ```
//!
//! Anonymous read access needs no configuration; authenticated write access
//! uses a registry API token from an `.o2arc` file, see [`Client::login`].
//! For full usage and configuration details, see the crate README.

#![forbid(unsafe_code)]

mod auth;
mod client;
mod config;
mod contacts;
mod dws;
mod error;
mod events;
mod identifier;
mod item_tree;
mod reference;
mod util;
mod uuid_index;

pub use client::{Client, ClientConfig, ItemRecord, ParameterRecord, Resource};
pub use config::{Credentials, DWS_URL, REGISTRY_URL, SANDBOX_REGISTRY_URL};
pub use contacts::{Contact, Person, parse_contacts};
pub use dws::{Aggregate, AggregateFunction, DataQuery, DataRow, DataTable};
pub use error::{Error, Result};
pub use events::{Event, Geolocation, most_recent_position, parse_events, sort_most_recent_first};
pub use identifier::Identifier;
pub use item_tree::{
    Item, ParsedTree, Parameter, Property, SubItem, parse_detailed_tree, parse_subitems,
};
pub use reference::Ref;
pub use uuid_index::{UUID_KEY, UuidIndex, is_uuid};
