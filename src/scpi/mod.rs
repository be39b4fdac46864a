pub mod adapter;
pub mod fake;
pub mod instrument;

pub use adapter::{Adapter, ConnectionConfig, TcpAdapter, TcpAdapterBuilder};
pub use fake::FakeAdapter;
pub use instrument::ScpiInstrument;
