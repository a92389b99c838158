/// Something a placement strategy can choose: a volume or a cold backend.
pub trait PlacementCandidate: Send + Sync {
    /// Proof of a reserved write slot.
    type Reservation;

    /// Admission check plus slot reservation as one atomic step.
    ///
    /// `None` means the candidate cannot take a block right now.
    fn reserve(&self) -> Option<Self::Reservation>;

    /// Admission check without reserving anything.
    fn is_admissible(&self) -> bool;

    fn used_bytes(&self) -> u64;

    fn available_bytes(&self) -> u64;

    fn block_count(&self) -> u64;

    /// Name used in logs.
    fn label(&self) -> String;
}
