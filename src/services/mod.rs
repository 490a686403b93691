/// Challenge lifecycle operations.
pub mod challenge_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Typed realtime event fan-out.
pub mod events;
/// Health check service.
pub mod health_service;
/// Identity-provider seam and display enrichment.
pub mod identity;
/// Resolution engine.
pub mod resolution_service;
/// Statistics aggregation and read APIs.
pub mod stats_service;
/// WebSocket connection handling.
pub mod websocket_service;
