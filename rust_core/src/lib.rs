//! Depth calculations over a mirrored order book side.

pub mod depth;

pub use depth::{
    effective_price, evaluate, max_order_size, DepthError, Evaluation, SideBookDepth,
};
