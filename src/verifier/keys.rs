use crate::ssh::SshPublicKey;

/// Outcome of one candidate certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlot {
    input_index: usize,
    key: Option<SshPublicKey>,
}

impl KeySlot {
    pub(crate) fn new(input_index: usize, key: Option<SshPublicKey>) -> Self {
        Self { input_index, key }
    }

    /// Position of the certificate in the input passed to
    /// [`CertKeyVerifier::start`](crate::CertKeyVerifier::start).
    pub fn input_index(&self) -> usize {
        self.input_index
    }

    /// The derived key, or `None` if the certificate was rejected by the
    /// helper or its key could not be derived.
    pub fn key(&self) -> Option<&SshPublicKey> {
        self.key.as_ref()
    }
}

/// Result of a successful verification run.
///
/// Holds one [`KeySlot`] per candidate certificate (certificates removed by
/// the matcher get no slot), in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedKeys {
    slots: Vec<KeySlot>,
    valid: usize,
}

impl VerifiedKeys {
    pub(crate) fn new(slots: Vec<KeySlot>, valid: usize) -> Self {
        Self { slots, valid }
    }

    /// All candidate slots, in input order.
    pub fn slots(&self) -> &[KeySlot] {
        &self.slots
    }

    /// Number of candidates that produced a key.
    pub fn valid_count(&self) -> usize {
        self.valid
    }

    /// Number of candidates (filled or empty slots).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the run had no candidates at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates the derived keys, skipping empty slots.
    pub fn keys(&self) -> impl Iterator<Item = &SshPublicKey> {
        self.slots.iter().filter_map(KeySlot::key)
    }

    /// Consumes the result, returning the slots.
    pub fn into_slots(self) -> Vec<KeySlot> {
        self.slots
    }
}
