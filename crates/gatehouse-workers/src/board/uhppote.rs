//! Datagram driver for the controller family the facility uses.
//!
//! The board speaks fixed 64-byte UDP frames: `0x17` start-of-message,
//! a function code, the controller serial number, then function-specific
//! fields with dates in packed BCD. Cards are granted all doors with a
//! 25-year validity window; revocation is explicit via delete.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use tokio::net::UdpSocket;

use super::{BoardDriver, DriverError};

const FRAME_LEN: usize = 64;
const SOM: u8 = 0x17;

const FUNC_SET_TIME: u8 = 0x30;
const FUNC_GET_TIME: u8 = 0x32;
const FUNC_PUT_CARD: u8 = 0x50;
const FUNC_DELETE_CARD: u8 = 0x52;

/// Granted-access window for added cards.
const CARD_VALIDITY_YEARS: i32 = 25;

/// How long one datagram exchange may take. The handler layer retries
/// timeouts; this only bounds a single attempt.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct UhppoteDriver {
    device_id: u32,
    endpoint: SocketAddr,
    timeout: Duration,
}

impl UhppoteDriver {
    pub fn new(device_id: u32, endpoint: SocketAddr) -> Self {
        Self {
            device_id,
            endpoint,
            timeout: EXCHANGE_TIMEOUT,
        }
    }

    fn frame(&self, function: u8) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[0] = SOM;
        buf[1] = function;
        buf[4..8].copy_from_slice(&self.device_id.to_le_bytes());
        buf
    }

    async fn execute(&self, request: [u8; FRAME_LEN]) -> Result<[u8; FRAME_LEN], DriverError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.send_to(&request, self.endpoint).await?;

        let mut buf = [0u8; FRAME_LEN];
        match tokio::time::timeout(self.timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((FRAME_LEN, _))) => {
                if buf[0] != SOM || buf[1] != request[1] {
                    return Err(DriverError::Protocol(format!(
                        "unexpected reply header {:02x} {:02x}",
                        buf[0], buf[1]
                    )));
                }
                Ok(buf)
            }
            Ok(Ok((n, _))) => Err(DriverError::Protocol(format!("short reply: {n} bytes"))),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DriverError::Timeout),
        }
    }
}

#[async_trait]
impl BoardDriver for UhppoteDriver {
    async fn put_card(&self, card: u32) -> Result<(), DriverError> {
        let today = chrono::Local::now().date_naive();
        let until = today
            .with_year(today.year() + CARD_VALIDITY_YEARS)
            .unwrap_or(today);

        let mut request = self.frame(FUNC_PUT_CARD);
        request[8..12].copy_from_slice(&card.to_le_bytes());
        encode_bcd_date(&mut request[12..16], today);
        encode_bcd_date(&mut request[16..20], until);
        // All four doors, full-time access.
        request[20] = 1;
        request[21] = 1;
        request[22] = 1;
        request[23] = 1;

        let reply = self.execute(request).await?;
        if reply[8] != 1 {
            return Err(DriverError::Protocol(format!(
                "controller refused card {card}"
            )));
        }
        Ok(())
    }

    async fn delete_card(&self, card: u32) -> Result<(), DriverError> {
        let mut request = self.frame(FUNC_DELETE_CARD);
        request[8..12].copy_from_slice(&card.to_le_bytes());

        let reply = self.execute(request).await?;
        if reply[8] != 1 {
            return Err(DriverError::Protocol(format!(
                "controller refused delete of card {card}"
            )));
        }
        Ok(())
    }

    async fn get_time(&self) -> Result<NaiveDateTime, DriverError> {
        let reply = self.execute(self.frame(FUNC_GET_TIME)).await?;
        decode_bcd_datetime(&reply[8..15])
            .ok_or_else(|| DriverError::Protocol("undecodable clock reply".into()))
    }

    async fn set_time(&self, when: NaiveDateTime) -> Result<(), DriverError> {
        let mut request = self.frame(FUNC_SET_TIME);
        encode_bcd_datetime(&mut request[8..15], when);
        self.execute(request).await?;
        Ok(())
    }
}

// ── Packed BCD ────────────────────────────────────────────────

fn bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0f)
}

/// YYYYMMDD in four bytes.
fn encode_bcd_date(buf: &mut [u8], date: NaiveDate) {
    let year = date.year() as u16;
    buf[0] = bcd((year / 100) as u8);
    buf[1] = bcd((year % 100) as u8);
    buf[2] = bcd(date.month() as u8);
    buf[3] = bcd(date.day() as u8);
}

/// YYYYMMDDHHMMSS in seven bytes.
fn encode_bcd_datetime(buf: &mut [u8], when: NaiveDateTime) {
    encode_bcd_date(&mut buf[0..4], when.date());
    buf[4] = bcd(when.hour() as u8);
    buf[5] = bcd(when.minute() as u8);
    buf[6] = bcd(when.second() as u8);
}

fn decode_bcd_datetime(buf: &[u8]) -> Option<NaiveDateTime> {
    let year = i32::from(from_bcd(buf[0])) * 100 + i32::from(from_bcd(buf[1]));
    let date = NaiveDate::from_ymd_opt(
        year,
        u32::from(from_bcd(buf[2])),
        u32::from(from_bcd(buf[3])),
    )?;
    date.and_hms_opt(
        u32::from(from_bcd(buf[4])),
        u32::from(from_bcd(buf[5])),
        u32::from(from_bcd(buf[6])),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_round_trips_two_digit_values() {
        for value in 0..=99u8 {
            assert_eq!(from_bcd(bcd(value)), value);
        }
        assert_eq!(bcd(24), 0x24);
    }

    #[test]
    fn datetime_encoding_round_trips() {
        let when = NaiveDate::from_ymd_opt(2024, 11, 5)
            .unwrap()
            .and_hms_opt(13, 37, 9)
            .unwrap();
        let mut buf = [0u8; 7];
        encode_bcd_datetime(&mut buf, when);
        assert_eq!(buf, [0x20, 0x24, 0x11, 0x05, 0x13, 0x37, 0x09]);
        assert_eq!(decode_bcd_datetime(&buf), Some(when));
    }

    #[test]
    fn frames_carry_som_function_and_device_id() {
        let driver = UhppoteDriver::new(423187757, "127.0.0.1:60000".parse().unwrap());
        let frame = driver.frame(FUNC_PUT_CARD);
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(frame[0], SOM);
        assert_eq!(frame[1], FUNC_PUT_CARD);
        assert_eq!(u32::from_le_bytes(frame[4..8].try_into().unwrap()), 423187757);
    }

    /// A canned device on localhost: replies to get-time with a fixed
    /// clock and acknowledges put-card.
    async fn fake_device() -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let mut buf = [0u8; FRAME_LEN];
            loop {
                let Ok((_, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let mut reply = [0u8; FRAME_LEN];
                reply[0] = SOM;
                reply[1] = buf[1];
                reply[4..8].copy_from_slice(&buf[4..8]);
                match buf[1] {
                    FUNC_GET_TIME => {
                        reply[8..15]
                            .copy_from_slice(&[0x20, 0x24, 0x06, 0x01, 0x12, 0x00, 0x00]);
                    }
                    FUNC_PUT_CARD | FUNC_DELETE_CARD => reply[8] = 1,
                    _ => {}
                }
                let _ = socket.send_to(&reply, peer).await;
            }
        });
        (addr, task)
    }

    #[tokio::test]
    async fn get_time_decodes_device_reply() {
        let (addr, device) = fake_device().await;
        let driver = UhppoteDriver::new(1, addr);

        let when = driver.get_time().await.unwrap();
        assert_eq!(
            when,
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
        device.abort();
    }

    #[tokio::test]
    async fn put_card_is_acknowledged() {
        let (addr, device) = fake_device().await;
        let driver = UhppoteDriver::new(1, addr);
        driver.put_card(1234567).await.unwrap();
        device.abort();
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        // Bind a socket that never answers.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let mut driver = UhppoteDriver::new(1, addr);
        driver.timeout = Duration::from_millis(50);
        let err = driver.get_time().await.unwrap_err();
        assert!(matches!(err, DriverError::Timeout));
    }
}
