use super::BlockPayload;

pub trait PayloadStore {
    /// Replace the payloads recorded at `height` with `payloads`
    fn add_block_payloads(&self, height: u32, payloads: &[BlockPayload]) -> anyhow::Result<()>;

    /// Get the payloads recorded at `height`, in key order
    fn get_block_payloads(&self, height: u32) -> anyhow::Result<Vec<BlockPayload>>;
}
