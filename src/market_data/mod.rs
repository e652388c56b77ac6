// Market data module entrypoint
pub mod adapters;       // venue-specific fetchers and the Lighter stream
pub mod normaliser;     // wire strings -> canonical symbols / percent rates
pub mod scheduler;      // poll cadence + stream lifecycle
pub mod router;         // adapters -> merge loop -> aggregator, read handle
