//! On-chain envelope codec: contract and reputation operations carried
//! inside an unspendable output so old nodes ignore them (soft-fork
//! compatible) while new nodes parse and validate.

use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"CVM1";
/// Standard on-chain output ceiling minus the 5-byte envelope header.
pub const MAX_BODY_LEN: usize = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Deploy = 0x01,
    Call = 0x02,
    SimpleVote = 0x03,
    TrustEdge = 0x04,
    BondedVote = 0x05,
    Dispute = 0x06,
    DaoVote = 0x07,
    EvmDeploy = 0x08,
    EvmCall = 0x09,
}

impl OpType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(OpType::Deploy),
            0x02 => Some(OpType::Call),
            0x03 => Some(OpType::SimpleVote),
            0x04 => Some(OpType::TrustEdge),
            0x05 => Some(OpType::BondedVote),
            0x06 => Some(OpType::Dispute),
            0x07 => Some(OpType::DaoVote),
            0x08 => Some(OpType::EvmDeploy),
            0x09 => Some(OpType::EvmCall),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("payload shorter than the envelope header")]
    Truncated,
    #[error("magic bytes do not match \"CVM1\"")]
    BadMagic,
    #[error("unknown operation type 0x{0:02x}")]
    UnknownOp(u8),
    #[error("body length {0} exceeds the {MAX_BODY_LEN}-byte ceiling")]
    BodyTooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub op: OpType,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn build(op: OpType, body: Vec<u8>) -> Result<Self, EnvelopeError> {
        if body.len() > MAX_BODY_LEN {
            return Err(EnvelopeError::BodyTooLarge(body.len()));
        }
        Ok(Self { op, body })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + self.body.len());
        out.extend_from_slice(MAGIC);
        out.push(self.op as u8);
        out.extend_from_slice(&self.body);
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < 5 {
            return Err(EnvelopeError::Truncated);
        }
        if &bytes[0..4] != MAGIC {
            return Err(EnvelopeError::BadMagic);
        }
        let op_byte = bytes[4];
        let op = OpType::from_byte(op_byte).ok_or(EnvelopeError::UnknownOp(op_byte))?;
        let body = bytes[5..].to_vec();
        if body.len() > MAX_BODY_LEN {
            return Err(EnvelopeError::BodyTooLarge(body.len()));
        }
        Ok(Self { op, body })
    }
}

/// Canonical `TrustEdge` body: `from`(20) + `to`(20) + `weight`(4, i32 LE).
/// Stands in for the full per-op canonical layouts the envelope carries;
/// the others (deploy, call, votes, disputes) follow the same
/// fixed-width little-endian convention over their own fields.
pub struct TrustEdgeBody {
    pub from: ethers::types::Address,
    pub to: ethers::types::Address,
    pub weight: i32,
}

impl TrustEdgeBody {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(44);
        out.extend_from_slice(self.from.as_bytes());
        out.extend_from_slice(self.to.as_bytes());
        out.extend_from_slice(&self.weight.to_le_bytes());
        out
    }

    pub fn decode(body: &[u8]) -> Result<Self, EnvelopeError> {
        if body.len() != 44 {
            return Err(EnvelopeError::Truncated);
        }
        let from = ethers::types::Address::from_slice(&body[0..20]);
        let to = ethers::types::Address::from_slice(&body[20..40]);
        let weight = i32::from_le_bytes(body[40..44].try_into().unwrap());
        Ok(Self { from, to, weight })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_op_type() {
        let ops = [
            OpType::Deploy,
            OpType::Call,
            OpType::SimpleVote,
            OpType::TrustEdge,
            OpType::BondedVote,
            OpType::Dispute,
            OpType::DaoVote,
            OpType::EvmDeploy,
            OpType::EvmCall,
        ];

        for op in ops {
            let envelope = Envelope::build(op, vec![0xab; 10]).unwrap();
            let encoded = envelope.encode();
            let decoded = Envelope::parse(&encoded).unwrap();
            assert_eq!(decoded.op, op);
            assert_eq!(decoded.body, vec![0xab; 10]);
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Envelope::build(OpType::Call, vec![1, 2, 3]).unwrap().encode();
        bytes[0] = b'X';
        assert!(matches!(Envelope::parse(&bytes), Err(EnvelopeError::BadMagic)));
    }

    #[test]
    fn rejects_oversize_body() {
        let result = Envelope::build(OpType::Call, vec![0; MAX_BODY_LEN + 1]);
        assert!(matches!(result, Err(EnvelopeError::BodyTooLarge(_))));
    }

    #[test]
    fn trust_edge_body_round_trips() {
        let body = TrustEdgeBody {
            from: ethers::types::Address::from_low_u64_be(1),
            to: ethers::types::Address::from_low_u64_be(2),
            weight: -42,
        };
        let encoded = body.encode();
        let decoded = TrustEdgeBody::decode(&encoded).unwrap();
        assert_eq!(decoded.from, body.from);
        assert_eq!(decoded.to, body.to);
        assert_eq!(decoded.weight, -42);
    }
}
