//! Helium Protocol - Packet plugins
//!
//! Plugins are reversible packet transforms applied symmetrically on the way
//! in and out. A connection owns two chains:
//!
//! | Chain     | Sees                    | Egress runs                   | Ingress runs                      |
//! |-----------|-------------------------|-------------------------------|-----------------------------------|
//! | `inside`  | tunnelled IP packets    | before encryption             | after decryption                  |
//! | `outside` | framed wire records     | in the bridge, after framing  | on raw datagrams, before decoding |
//!
//! ## Bundled plugins
//!
//! | Module        | Description                 |
//! |---------------|-----------------------------|
//! | `compression` | zstd packet compression     |

mod chain;
#[cfg(feature = "compression")]
mod compression;

pub use chain::*;
#[cfg(feature = "compression")]
pub use compression::*;
