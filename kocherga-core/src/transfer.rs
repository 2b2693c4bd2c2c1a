// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The transfer model shared by the serial codec and the reactor: node ids,
//! priorities, and the subject/service data specifier encoded in a serial
//! frame's `DataSpec` field.

/// A 16-bit node address. `0xFFFF` stands for "anonymous" on the sending
/// side and "broadcast" on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u16);

impl NodeId {
    pub const ANONYMOUS: NodeId = NodeId(0xFFFF);

    pub fn is_anonymous(self) -> bool {
        self.0 == 0xFFFF
    }
}

impl From<u16> for NodeId {
    fn from(v: u16) -> Self {
        NodeId(v)
    }
}

/// Transfer priority, 0 (highest) through 7 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Priority {
    Exceptional = 0,
    Immediate = 1,
    Fast = 2,
    High = 3,
    Nominal = 4,
    Low = 5,
    Slow = 6,
    Optional = 7,
}

impl Priority {
    pub fn from_u8(v: u8) -> Self {
        match v & 0x07 {
            0 => Priority::Exceptional,
            1 => Priority::Immediate,
            2 => Priority::Fast,
            3 => Priority::High,
            4 => Priority::Nominal,
            5 => Priority::Low,
            6 => Priority::Slow,
            _ => Priority::Optional,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Optional
    }
}

const RESPONSE_MASK: u16 = 0xC000;
const REQUEST_MASK: u16 = 0x8000;
const SERVICE_ID_MASK_RESPONSE: u16 = 0x3FFF;
const SERVICE_ID_MASK_REQUEST: u16 = 0x7FFF;

/// What a transfer addresses: a publish/subscribe subject, or a service
/// tagged as request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSpec {
    Message { subject_id: u16 },
    Request { service_id: u16 },
    Response { service_id: u16 },
}

impl DataSpec {
    /// Decode a wire `DataSpec` field per the mask rules in the header layout.
    pub fn decode(spec: u16) -> Self {
        if spec & RESPONSE_MASK == RESPONSE_MASK {
            DataSpec::Response {
                service_id: spec & SERVICE_ID_MASK_RESPONSE,
            }
        } else if spec & REQUEST_MASK == REQUEST_MASK {
            DataSpec::Request {
                service_id: spec & SERVICE_ID_MASK_REQUEST,
            }
        } else {
            DataSpec::Message { subject_id: spec }
        }
    }

    pub fn encode(self) -> u16 {
        match self {
            DataSpec::Message { subject_id } => subject_id,
            DataSpec::Request { service_id } => service_id | REQUEST_MASK,
            DataSpec::Response { service_id } => service_id | RESPONSE_MASK,
        }
    }
}

/// One logical message exchanged between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer<'a> {
    pub priority: Priority,
    pub source: NodeId,
    pub destination: NodeId,
    pub data_spec: DataSpec,
    pub transfer_id: u64,
    pub payload: &'a [u8],
}
