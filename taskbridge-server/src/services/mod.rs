/// Chat delivery services: durable storage, the live-channel registry, and
/// the routing pipeline that ties them together.
pub mod connection_registry;
pub mod delivery_router;
pub mod message_store;
