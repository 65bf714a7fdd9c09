// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// Training runs on Autodiff<Wgpu> when an adapter is available
// and on Autodiff<NdArray> otherwise:
//
//   --device gpu   → Wgpu or fail with DeviceUnavailable
//   --device cpu   → NdArray
//   --device auto  → probe Wgpu, fall back to NdArray with a warning

use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Wgpu},
    prelude::*,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

use crate::domain::error::TrainingError;

pub type GpuBackend      = burn::backend::Autodiff<Wgpu>;
pub type CpuBackend      = burn::backend::Autodiff<burn::backend::NdArray>;
pub type GpuInferBackend = Wgpu;
pub type CpuInferBackend = burn::backend::NdArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChoice {
    #[default]
    Auto,
    Gpu,
    Cpu,
}

#[derive(Debug, Clone)]
pub enum SelectedDevice {
    Gpu(WgpuDevice),
    Cpu(NdArrayDevice),
}

pub fn select_device(choice: DeviceChoice) -> Result<SelectedDevice, TrainingError> {
    match choice {
        DeviceChoice::Cpu => Ok(SelectedDevice::Cpu(NdArrayDevice::Cpu)),
        DeviceChoice::Gpu => {
            let device = WgpuDevice::default();
            probe_gpu(&device)?;
            Ok(SelectedDevice::Gpu(device))
        }
        DeviceChoice::Auto => {
            let device = WgpuDevice::default();
            match probe_gpu(&device) {
                Ok(()) => Ok(SelectedDevice::Gpu(device)),
                Err(e) => {
                    tracing::warn!("{e}; falling back to CPU (NdArray)");
                    Ok(SelectedDevice::Cpu(NdArrayDevice::Cpu))
                }
            }
        }
    }
}

/// wgpu panics when no adapter can be created; turn that into an error.
fn probe_gpu(device: &WgpuDevice) -> Result<(), TrainingError> {
    let device = device.clone();
    panic::catch_unwind(AssertUnwindSafe(move || {
        Tensor::<Wgpu, 1>::zeros([1], &device).into_data()
    }))
    .map(|_| ())
    .map_err(|_| TrainingError::DeviceUnavailable("no usable wgpu adapter".to_string()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_choice_never_probes() {
        let selected = select_device(DeviceChoice::Cpu).unwrap();
        assert!(matches!(selected, SelectedDevice::Cpu(_)));
    }

    #[test]
    fn test_choice_parses_from_cli_text() {
        assert_eq!(DeviceChoice::from_str("gpu", true).unwrap(), DeviceChoice::Gpu);
        assert_eq!(DeviceChoice::from_str("AUTO", true).unwrap(), DeviceChoice::Auto);
        assert!(DeviceChoice::from_str("tpu", true).is_err());
    }
}
