//! TCP 传输实现

use crate::{Connector, DEFAULT_READ_TIMEOUT, Link, LinkError};
use bytes::{Bytes, BytesMut};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use wheel_protocol::{FRAME_TERMINATOR, MAX_FRAME_LEN};

/// TCP 连接工厂
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    /// 使用默认超时（1s）创建
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// 设置连接/读/写超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> Result<Box<dyn Link>, LinkError> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| LinkError::Resolve { addr: self.peer() })?;

        let mut last_err = LinkError::Resolve { addr: self.peer() };
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    stream.set_nodelay(true)?;
                    debug!("TCP connected to {}", addr);
                    return Ok(Box::new(TcpLink::new(stream, self.timeout)));
                },
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", addr, e);
                    last_err = LinkError::Io(e);
                },
            }
        }
        Err(last_err)
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 已建立的 TCP 连接
pub struct TcpLink {
    stream: TcpStream,
    timeout: Duration,
    buf: BytesMut,
}

impl TcpLink {
    pub fn new(stream: TcpStream, timeout: Duration) -> Self {
        Self {
            stream,
            timeout,
            buf: BytesMut::with_capacity(MAX_FRAME_LEN),
        }
    }
}

impl Link for TcpLink {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        trace!("-> {}", hex::encode(frame));
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Bytes, LinkError> {
        // 整帧受同一个截止时间约束，慢速对端也不能无限延长一次往返
        let deadline = Instant::now() + self.timeout;
        self.buf.clear();
        let mut chunk = [0u8; 256];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LinkError::Timeout);
            }
            self.stream.set_read_timeout(Some(remaining))?;

            let n = match self.stream.read(&mut chunk) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(LinkError::Timeout);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::Io(e)),
            };
            self.buf.extend_from_slice(&chunk[..n]);

            // 帧头两个字节之后的第一个结束符即为帧尾
            if let Some(pos) = self
                .buf
                .iter()
                .skip(2)
                .position(|&b| b == FRAME_TERMINATOR)
            {
                let end = pos + 3;
                if self.buf.len() > end {
                    debug!("Discarding {} trailing bytes", self.buf.len() - end);
                }
                let frame = self.buf.split_to(end).freeze();
                trace!("<- {}", hex::encode(&frame));
                return Ok(frame);
            }

            if self.buf.len() > MAX_FRAME_LEN {
                return Err(LinkError::FrameTooLong {
                    limit: MAX_FRAME_LEN,
                });
            }
        }
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use wheel_protocol::{decode, encode};

    /// 启动一个只回复固定字节序列的 TCP 服务器
    fn spawn_server(reply: &'static [u8]) -> (u16, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut req = [0u8; 64];
            let n = sock.read(&mut req).unwrap();
            sock.write_all(reply).unwrap();
            // 保持连接直到客户端读完
            thread::sleep(Duration::from_millis(50));
            req[..n].to_vec()
        });
        (port, handle)
    }

    #[test]
    fn test_tcp_round_trip() {
        let (port, server) = spawn_server(b"\x00\x07e=42\r");
        let connector = TcpConnector::new("127.0.0.1", port);
        let mut link = connector.connect().unwrap();

        link.send_frame(&encode("RUe1")).unwrap();
        let frame = link.receive_frame().unwrap();
        assert_eq!(decode(&frame), "e=42");

        let request = server.join().unwrap();
        assert_eq!(request, b"\x00\x07RUe1\r");
    }

    #[test]
    fn test_tcp_discards_trailing_bytes() {
        let (port, server) = spawn_server(b"\x00\x07%\r\x00\x07junk");
        let mut link = TcpConnector::new("127.0.0.1", port).connect().unwrap();

        link.send_frame(&encode("CJ")).unwrap();
        assert_eq!(decode(&link.receive_frame().unwrap()), "%");
        server.join().unwrap();
    }

    #[test]
    fn test_tcp_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(sock);
        });

        let connector =
            TcpConnector::new("127.0.0.1", port).with_timeout(Duration::from_millis(100));
        let mut link = connector.connect().unwrap();
        link.send_frame(&encode("RUe1")).unwrap();

        let start = Instant::now();
        let err = link.receive_frame().unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err:?}");
        assert!(start.elapsed() < Duration::from_millis(280));
        server.join().unwrap();
    }

    #[test]
    fn test_tcp_peer_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            drop(sock);
        });

        let mut link = TcpConnector::new("127.0.0.1", port).connect().unwrap();
        server.join().unwrap();
        let err = link.receive_frame().unwrap_err();
        assert!(
            matches!(err, LinkError::Closed | LinkError::Io(_)),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_connect_refused() {
        // 绑定后立即释放端口，连接应被拒绝
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new("127.0.0.1", port);
        assert!(connector.connect().is_err());
        assert_eq!(connector.peer(), format!("127.0.0.1:{port}"));
    }
}
