/// Domain-event builders publishing onto the bus.
pub mod bus_events;
/// OpenAPI documentation generation.
pub mod documentation;
/// Bridging of the domain-event bus onto SSE responses.
pub mod event_feed;
/// Health check and controller liveness reporting.
pub mod health_service;
/// Session lifecycle control plane.
pub mod session_service;
