use anyhow::{ensure, Result};
use candle_core::{DType, Tensor, D};

/// Mean of the unmasked token states, L2-normalised per row.
///
/// `hidden` is `[B, T, H]` and `attention_mask` is `[B, T]` with 1 for real
/// tokens and 0 for padding. Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, width) = match hidden.dims() {
        &[b, t, h] => (b, t, h),
        other => anyhow::bail!("hidden states must be [B, T, H], got {other:?}"),
    };
    ensure!(
        attention_mask.dims() == [batch, tokens],
        "attention mask {:?} does not match hidden states [{batch}, {tokens}]",
        attention_mask.dims()
    );

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(D::Minus1)?)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?;
    let mean = summed.broadcast_div(&counts)?;

    let eps = if hidden.dtype() == DType::F16 { 1e-6 } else { 1e-12 };
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    ensure!(pooled.dims() == [batch, width], "pooled shape {:?} != [{batch}, {width}]", pooled.dims());
    Ok(pooled)
}
