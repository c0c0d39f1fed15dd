#![cfg(feature = "dqn-gpu")]

use candle::{DType, Device, Tensor};
use candle_core as candle;
use candle_nn as nn;
use candle_nn::{Module, Optimizer, VarBuilder};

use crate::error::{Result, SnakeError};
use crate::features::{OBS_LEN, Observation};
use crate::policy::Policy;
use crate::pos::ACTIONS;
use crate::replay::Transition;

fn policy_err(e: candle::Error) -> SnakeError {
    SnakeError::Policy(e.to_string())
}

#[derive(Debug)]
pub struct DqnNet {
    hidden: nn::Linear,
    out: nn::Linear,
}

impl DqnNet {
    pub fn new(vb: VarBuilder, hidden: usize) -> candle::Result<Self> {
        // Scope variable names to avoid collisions across layers.
        let hidden_layer = nn::linear(OBS_LEN, hidden, vb.pp("hidden"))?;
        let out = nn::linear(hidden, ACTIONS, vb.pp("out"))?;
        Ok(Self { hidden: hidden_layer, out })
    }

    /// [batch, OBS_LEN] -> [batch, ACTIONS]
    pub fn q_values(&self, x: &Tensor) -> candle::Result<Tensor> {
        let x = self.hidden.forward(x)?.relu()?;
        self.out.forward(&x)
    }
}

/// Two-layer Q network trained on `r + gamma * max Q(s')` with MSE.
pub struct DqnPolicy {
    net: DqnNet,
    opt: nn::AdamW,
    gamma: f32,
    device: Device,
}

impl DqnPolicy {
    pub fn new(hidden: usize, lr: f64, gamma: f32, device: &Device) -> Result<Self> {
        let varmap = nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let net = DqnNet::new(vb, hidden).map_err(policy_err)?;
        let opt = nn::AdamW::new_lr(varmap.all_vars(), lr).map_err(policy_err)?;
        Ok(Self { net, opt, gamma, device: device.clone() })
    }

    fn states(&self, states: impl Iterator<Item = Observation>) -> candle::Result<Tensor> {
        let flat: Vec<f32> = states.flat_map(|s| s.to_f32()).collect();
        let batch = flat.len() / OBS_LEN;
        Tensor::from_vec(flat, (batch, OBS_LEN), &self.device)
    }

    fn train_step(&mut self, batch: &[Transition]) -> candle::Result<()> {
        let bsz = batch.len();
        let s_t = self.states(batch.iter().map(|t| t.state))?;
        let ns_t = self.states(batch.iter().map(|t| t.next_state))?;
        let a: Vec<u32> = batch.iter().map(|t| t.action.index() as u32).collect();
        let a_t = Tensor::from_vec(a, (bsz, 1), &self.device)?;

        // Targets are computed outside the graph.
        let max_nq: Vec<f32> = self.net.q_values(&ns_t)?.max(1)?.to_vec1()?;
        let target: Vec<f32> = batch
            .iter()
            .zip(max_nq)
            .map(|(t, nq)| if t.done { t.reward } else { t.reward + self.gamma * nq })
            .collect();
        let target_t = Tensor::from_vec(target, bsz, &self.device)?;

        let q_a = self.net.q_values(&s_t)?.gather(&a_t, 1)?.squeeze(1)?;
        let loss = nn::loss::mse(&q_a, &target_t)?;
        self.opt.backward_step(&loss)
    }
}

impl Policy for DqnPolicy {
    fn predict(&mut self, state: &Observation) -> Result<[f32; ACTIONS]> {
        let x = self.states(std::iter::once(*state)).map_err(policy_err)?;
        let q: Vec<Vec<f32>> = self.net.q_values(&x).and_then(|q| q.to_vec2()).map_err(policy_err)?;
        let row = q.first().ok_or_else(|| SnakeError::Policy("empty q output".into()))?;
        let mut out = [0.0; ACTIONS];
        for (o, v) in out.iter_mut().zip(row) {
            *o = *v;
        }
        Ok(out)
    }

    fn update(&mut self, batch: &[Transition]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.train_step(batch).map_err(policy_err)
    }
}

pub fn preferred_device() -> Device {
    // Try CUDA if feature enabled, else CPU
    #[cfg(feature = "dqn-gpu-cuda")]
    if let Ok(dev) = Device::new_cuda(0) {
        return dev;
    }
    Device::Cpu
}
