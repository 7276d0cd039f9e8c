pub mod deadline;
pub mod tcp;
pub mod udp;

pub use deadline::ConnectionDeadline;
pub use tcp::{ChunkedReader, FrameReader};
pub use udp::{DatagramSocket, UdpResender, connect_udp};
