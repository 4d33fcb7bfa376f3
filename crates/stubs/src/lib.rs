//! Client-side stubs for cross-endpoint calls.
//!
//! When an annotated callable invokes another annotated callable, the call
//! leaves the process: the stub serializes the caller's source (with
//! generated stubs for its own remote references inlined), ships it as a
//! job to the target's queue endpoint — or as an HTTP request to its LB
//! endpoint — and decodes the answer. The annotation side-table is the
//! client-side registry the dependency resolver walks.

pub mod factory;
pub mod lb_stub;
pub mod queue_stub;
pub mod resolver;
pub mod stub_registry;

pub use factory::{stub, RemoteStub, StubContext};
pub use stub_registry::{AnnotatedCallable, StubRegistry};
