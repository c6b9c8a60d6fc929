pub trait HeightStore {
    /// Get the max processed height, `None` before the first block
    fn get_max_processed_height(&self) -> anyhow::Result<Option<u32>>;

    /// Durably set the max processed height
    fn set_max_processed_height(&self, height: u32) -> anyhow::Result<()>;

    /// Durably set the max processed height to `height` only if it is still
    /// `expected`. Returns whether the write happened.
    ///
    /// Atomic with respect to every other caller sharing this store.
    fn compare_and_set_max_processed_height(
        &self,
        expected: Option<u32>,
        height: u32,
    ) -> anyhow::Result<bool>;
}
