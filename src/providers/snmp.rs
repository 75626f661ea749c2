//! Network-poll strategy: queries UCD-SNMP counters over SNMPv2c.
//!
//! Only the small slice of BER needed for a v2c GetRequest/GetResponse
//! exchange is implemented here. Appliances that answer the probe but do
//! not expose a counter simply leave the matching metric absent.

use std::fmt::{self, Display, Formatter};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::{MetricReading, config::SnmpConfig, targets::MonitoredTarget};

use super::{MetricProvider, Outcome, Unavailability};

/// MIB-2 sysDescr, used as a cheap reachability probe.
const SYS_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
/// UCD-SNMP ssCpuIdle, percent idle over the last minute.
const SS_CPU_IDLE: &[u32] = &[1, 3, 6, 1, 4, 1, 2021, 11, 11, 0];
/// UCD-SNMP memTotalReal, in kilobytes.
const MEM_TOTAL_REAL: &[u32] = &[1, 3, 6, 1, 4, 1, 2021, 4, 5, 0];
/// UCD-SNMP memAvailReal, in kilobytes.
const MEM_AVAIL_REAL: &[u32] = &[1, 3, 6, 1, 4, 1, 2021, 4, 6, 0];
/// UCD-SNMP dskPercent for the first monitored filesystem.
const DSK_PERCENT: &[u32] = &[1, 3, 6, 1, 4, 1, 2021, 9, 1, 9, 1];

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_GET_REQUEST: u8 = 0xA0;
const TAG_GET_RESPONSE: u8 = 0xA2;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// Wire value for SNMPv2c in the message header.
const VERSION_2C: i64 = 1;

const MAX_RESPONSE_SIZE: usize = 4096;

#[derive(Debug, PartialEq, Eq)]
enum SnmpError {
    Truncated,
    UnexpectedTag(u8),
    ErrorStatus(i64),
    RequestIdMismatch,
}

impl Display for SnmpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SnmpError::Truncated => write!(f, "truncated or malformed packet"),
            SnmpError::UnexpectedTag(tag) => write!(f, "unexpected tag 0x{tag:02x}"),
            SnmpError::ErrorStatus(status) => write!(f, "agent returned error status {status}"),
            SnmpError::RequestIdMismatch => write!(f, "response does not match request id"),
        }
    }
}

impl std::error::Error for SnmpError {}

#[derive(Debug, Clone, PartialEq)]
enum VarValue {
    Int(i64),
    Bytes(Vec<u8>),
    /// noSuchObject, noSuchInstance or endOfMibView
    Missing,
    Other(u8),
}

fn push_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.push((len >> 8) as u8);
        out.push(len as u8);
    }
}

fn push_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    push_len(out, content.len());
    out.extend_from_slice(content);
}

/// Minimal two's complement encoding of an INTEGER.
fn encode_int(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn encode_oid(oid: &[u32]) -> Vec<u8> {
    let (first, second, rest) = match oid {
        [first, second, rest @ ..] => (*first, *second, rest),
        _ => return Vec::new(),
    };

    let mut out = vec![(first * 40 + second) as u8];
    for &arc in rest {
        if arc < 0x80 {
            out.push(arc as u8);
            continue;
        }
        // base-128 with the continuation bit on every byte but the last
        let mut stack = [0u8; 5];
        let mut idx = stack.len();
        let mut remaining = arc;
        while remaining > 0 {
            idx -= 1;
            stack[idx] = (remaining & 0x7F) as u8;
            remaining >>= 7;
        }
        for i in idx..stack.len() - 1 {
            out.push(stack[i] | 0x80);
        }
        out.push(stack[stack.len() - 1]);
    }
    out
}

fn decode_int(bytes: &[u8]) -> Result<i64, SnmpError> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(SnmpError::Truncated);
    }
    let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in bytes {
        value = (value << 8) | byte as i64;
    }
    Ok(value)
}

/// Counter32, Gauge32 and TimeTicks carry unsigned content.
fn decode_uint(bytes: &[u8]) -> Result<i64, SnmpError> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(SnmpError::Truncated);
    }
    let mut value: u64 = 0;
    for &byte in bytes {
        value = (value << 8) | byte as u64;
    }
    Ok(value as i64)
}

fn build_get_request(community: &str, request_id: i32, oids: &[&[u32]]) -> Vec<u8> {
    let mut varbinds = Vec::new();
    for oid in oids {
        let mut varbind = Vec::new();
        push_tlv(&mut varbind, TAG_OID, &encode_oid(oid));
        push_tlv(&mut varbind, TAG_NULL, &[]);
        push_tlv(&mut varbinds, TAG_SEQUENCE, &varbind);
    }

    let mut pdu = Vec::new();
    push_tlv(&mut pdu, TAG_INTEGER, &encode_int(request_id as i64));
    push_tlv(&mut pdu, TAG_INTEGER, &encode_int(0));
    push_tlv(&mut pdu, TAG_INTEGER, &encode_int(0));
    push_tlv(&mut pdu, TAG_SEQUENCE, &varbinds);

    let mut message = Vec::new();
    push_tlv(&mut message, TAG_INTEGER, &encode_int(VERSION_2C));
    push_tlv(&mut message, TAG_OCTET_STRING, community.as_bytes());
    push_tlv(&mut message, TAG_GET_REQUEST, &pdu);

    let mut packet = Vec::new();
    push_tlv(&mut packet, TAG_SEQUENCE, &message);
    packet
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_byte(&mut self) -> Result<u8, SnmpError> {
        let byte = *self.buf.get(self.pos).ok_or(SnmpError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_len(&mut self) -> Result<usize, SnmpError> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let count = (first & 0x7F) as usize;
        // indefinite lengths are not valid BER for SNMP
        if count == 0 || count > 4 {
            return Err(SnmpError::Truncated);
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.read_byte()? as usize;
        }
        Ok(len)
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), SnmpError> {
        let tag = self.read_byte()?;
        let len = self.read_len()?;
        let end = self.pos.checked_add(len).ok_or(SnmpError::Truncated)?;
        if end > self.buf.len() {
            return Err(SnmpError::Truncated);
        }
        let content = &self.buf[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    fn expect_tag(&mut self, expected: u8) -> Result<&'a [u8], SnmpError> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(SnmpError::UnexpectedTag(tag));
        }
        Ok(content)
    }

    fn read_int(&mut self) -> Result<i64, SnmpError> {
        decode_int(self.expect_tag(TAG_INTEGER)?)
    }
}

/// Unpacks a GetResponse into (encoded oid, value) pairs.
fn parse_response(buf: &[u8], request_id: i32) -> Result<Vec<(Vec<u8>, VarValue)>, SnmpError> {
    let mut outer = Decoder::new(buf);
    let message = outer.expect_tag(TAG_SEQUENCE)?;

    let mut message = Decoder::new(message);
    message.read_int()?;
    message.expect_tag(TAG_OCTET_STRING)?;
    let pdu = message.expect_tag(TAG_GET_RESPONSE)?;

    let mut pdu = Decoder::new(pdu);
    if pdu.read_int()? != request_id as i64 {
        return Err(SnmpError::RequestIdMismatch);
    }
    let error_status = pdu.read_int()?;
    if error_status != 0 {
        return Err(SnmpError::ErrorStatus(error_status));
    }
    pdu.read_int()?;
    let varbind_list = pdu.expect_tag(TAG_SEQUENCE)?;

    let mut varbinds = Vec::new();
    let mut list = Decoder::new(varbind_list);
    while !list.done() {
        let varbind = list.expect_tag(TAG_SEQUENCE)?;
        let mut varbind = Decoder::new(varbind);
        let oid = varbind.expect_tag(TAG_OID)?.to_vec();
        let (tag, content) = varbind.read_tlv()?;
        let value = match tag {
            TAG_INTEGER => VarValue::Int(decode_int(content)?),
            TAG_COUNTER32 | TAG_GAUGE32 | TAG_TIMETICKS => VarValue::Int(decode_uint(content)?),
            TAG_OCTET_STRING => VarValue::Bytes(content.to_vec()),
            TAG_NO_SUCH_OBJECT | TAG_NO_SUCH_INSTANCE | TAG_END_OF_MIB_VIEW => VarValue::Missing,
            other => VarValue::Other(other),
        };
        varbinds.push((oid, value));
    }

    Ok(varbinds)
}

pub struct SnmpProvider {
    community: String,
    port: u16,
    timeout: Duration,
    request_id: AtomicI32,
}

impl SnmpProvider {
    pub fn new(config: &SnmpConfig) -> Self {
        Self {
            community: config.community.clone(),
            port: config.port,
            timeout: Duration::from_secs(config.timeout),
            request_id: AtomicI32::new(1),
        }
    }

    async fn get(
        &self,
        address: &str,
        oids: &[&[u32]],
    ) -> Result<Vec<(Vec<u8>, VarValue)>, Unavailability> {
        let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let packet = build_get_request(&self.community, request_id, oids);

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(map_io_error)?;
        socket
            .send_to(&packet, (address, self.port))
            .await
            .map_err(map_io_error)?;

        let mut buf = [0u8; MAX_RESPONSE_SIZE];
        let received = match tokio::time::timeout(self.timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => len,
            Ok(Err(e)) => return Err(map_io_error(e)),
            Err(_) => return Err(Unavailability::Timeout),
        };

        parse_response(&buf[..received], request_id)
            .map_err(|e| Unavailability::ProtocolError(e.to_string()))
    }
}

fn map_io_error(e: std::io::Error) -> Unavailability {
    if e.kind() == ErrorKind::PermissionDenied {
        Unavailability::PermissionDenied
    } else {
        Unavailability::ProtocolError(e.to_string())
    }
}

#[async_trait]
impl MetricProvider for SnmpProvider {
    fn name(&self) -> &'static str {
        "snmp"
    }

    fn supports(&self, _target: &MonitoredTarget) -> bool {
        true
    }

    async fn acquire(&self, target: &MonitoredTarget) -> Outcome {
        trace!("probing {} over snmp", target.address);

        if let Err(unavailable) = self.get(&target.address, &[SYS_DESCR]).await {
            return Outcome::Unavailable(unavailable);
        }

        let varbinds = match self
            .get(
                &target.address,
                &[SS_CPU_IDLE, MEM_TOTAL_REAL, MEM_AVAIL_REAL, DSK_PERCENT],
            )
            .await
        {
            Ok(varbinds) => varbinds,
            Err(unavailable) => return Outcome::Unavailable(unavailable),
        };

        let lookup = |oid: &[u32]| -> Option<i64> {
            let encoded = encode_oid(oid);
            varbinds.iter().find_map(|(bytes, value)| match value {
                VarValue::Int(v) if *bytes == encoded => Some(*v),
                _ => None,
            })
        };

        let cpu = lookup(SS_CPU_IDLE).map(|idle| 100.0 - idle as f32);
        let ram = if let Some(total) = lookup(MEM_TOTAL_REAL)
            && let Some(available) = lookup(MEM_AVAIL_REAL)
            && total > 0
        {
            Some((total - available) as f32 / total as f32 * 100.0)
        } else {
            None
        };
        let disk = lookup(DSK_PERCENT).map(|percent| percent as f32);

        Outcome::Reading(MetricReading { cpu, ram, disk })
    }
}
