//! Bytecode Format Detector: classifies raw contract bytecode as NATIVE,
//! EVM, HYBRID, or UNKNOWN before the coordinator picks an interpreter,
//! caching results by content hash since the same bytecode is deployed and
//! re-executed often.

use parking_lot::RwLock;
use shared::crypto::hashing::blake3_hash;
use shared::types::{BytecodeFormat, DetectionResult};
use std::collections::HashMap;

/// Leading bytes that mark a payload as this chain's native bytecode
/// format rather than an EVM-compatible one.
const NATIVE_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// Bytecode shorter than this can't carry a meaningful opcode sequence;
/// classify it UNKNOWN outright rather than guessing.
const MIN_BYTECODE_LEN: usize = 2;

/// Confidence threshold above which the EVM-opcode heuristic counts as a
/// positive signal.
const EVM_CONFIDENCE_THRESHOLD: f64 = 0.35;

/// Opcodes that appear often enough in real EVM bytecode that their
/// presence is evidence (not proof) of an EVM payload: STOP, the PUSH1-32
/// range, DUP1-16, SWAP1-16, JUMPDEST, RETURN, REVERT.
fn looks_like_evm_opcode(byte: u8) -> bool {
    matches!(byte, 0x00 | 0x60..=0x7f | 0x80..=0x9f | 0x5b | 0xf3 | 0xfd)
}

pub struct BytecodeFormatDetector {
    cache: RwLock<HashMap<String, DetectionResult>>,
}

impl BytecodeFormatDetector {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn detect(&self, bytecode: &[u8]) -> DetectionResult {
        let key = blake3_hash(bytecode);

        if let Some(cached) = self.cache.read().get(&key) {
            return cached.clone();
        }

        let result = Self::classify(bytecode);
        self.cache.write().insert(key, result.clone());
        result
    }

    /// Decision order: (a) native magic prefix present and nothing else ->
    /// NATIVE; (b) EVM-opcode heuristic alone clears the threshold -> EVM;
    /// (c) both signals present -> HYBRID; (d) neither -> UNKNOWN.
    fn classify(bytecode: &[u8]) -> DetectionResult {
        if bytecode.len() < MIN_BYTECODE_LEN {
            return DetectionResult {
                format: BytecodeFormat::Unknown,
                confidence: 0.0,
            };
        }

        let native_signal = bytecode.len() >= 4 && bytecode[0..4] == NATIVE_MAGIC;

        let recognized = bytecode.iter().filter(|&&b| looks_like_evm_opcode(b)).count();
        let evm_confidence = recognized as f64 / bytecode.len() as f64;
        let evm_signal = evm_confidence >= EVM_CONFIDENCE_THRESHOLD;

        match (native_signal, evm_signal) {
            (true, true) => DetectionResult {
                format: BytecodeFormat::Hybrid,
                confidence: (1.0 + evm_confidence) / 2.0,
            },
            (true, false) => DetectionResult {
                format: BytecodeFormat::Native,
                confidence: 1.0,
            },
            (false, true) => DetectionResult {
                format: BytecodeFormat::Evm,
                confidence: evm_confidence,
            },
            (false, false) => DetectionResult {
                format: BytecodeFormat::Unknown,
                confidence: 1.0 - evm_confidence,
            },
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for BytecodeFormatDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_native_magic() {
        let detector = BytecodeFormatDetector::new();
        let mut bytecode = NATIVE_MAGIC.to_vec();
        bytecode.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let result = detector.detect(&bytecode);
        assert_eq!(result.format, BytecodeFormat::Native);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn detects_evm_like_bytecode() {
        let detector = BytecodeFormatDetector::new();
        // PUSH1 0x00, PUSH1 0x00, RETURN
        let bytecode = vec![0x60, 0x00, 0x60, 0x00, 0xf3];

        let result = detector.detect(&bytecode);
        assert_eq!(result.format, BytecodeFormat::Evm);
    }

    #[test]
    fn native_magic_with_dense_evm_opcodes_is_hybrid() {
        let detector = BytecodeFormatDetector::new();
        let mut bytecode = NATIVE_MAGIC.to_vec();
        bytecode.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0xf3, 0x5b, 0x80, 0x90]);

        let result = detector.detect(&bytecode);
        assert_eq!(result.format, BytecodeFormat::Hybrid);
    }

    #[test]
    fn empty_bytecode_is_unknown() {
        let detector = BytecodeFormatDetector::new();
        assert_eq!(detector.detect(&[]).format, BytecodeFormat::Unknown);
    }

    #[test]
    fn cache_hits_avoid_reclassification() {
        let detector = BytecodeFormatDetector::new();
        let bytecode = vec![0x60, 0x00, 0xf3];

        detector.detect(&bytecode);
        detector.detect(&bytecode);

        assert_eq!(detector.cache_len(), 1);
    }
}
