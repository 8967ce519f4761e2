// Branch Policy Kernel
//
// Local/remote mapping primitives for branch policy resources.

pub mod client;
pub mod policy;
pub mod remote;
pub mod resource;
pub mod schema;
pub mod state;
