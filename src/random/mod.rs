//! Seeded random number streams.
//!
//! Every source of randomness in the simulation is a named stream declared with
//! [`define_rng!`]. All streams derive their seed from one base seed given to
//! [`ContextRandomExt::init_random`], so a run is reproducible from that seed while the
//! streams stay independent of each other: drawing more lethality rolls never shifts the
//! transmission draws.
mod context_ext;
mod macros;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;

use crate::define_data_plugin;
use crate::hashing::HashMap;
use crate::rand::SeedableRng;

pub trait RngId: Copy + Clone {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// Holds any generator implementing `SeedableRng`.
struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// `rng_holders` sits in a RefCell so that sampling only needs `&Context`.
define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        rng_holders: RefCell::new(HashMap::default()),
    }
);
