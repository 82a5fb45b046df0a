use crate::Tensor;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait defining the interface for parameter optimization algorithms
pub trait Optimizer: Send + Sync {
    /// Initializes optimizer state (if any), one slot per parameter in order
    fn init(&mut self, _params: &[&Tensor]) {}

    /// Updates parameters using computed gradients
    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32);
}

/// Optimizers selectable from the command line or a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[serde(alias = "SGD")]
    Sgd,
    #[serde(alias = "Adadelta")]
    Adadelta,
    #[serde(alias = "Adagrad")]
    Adagrad,
    #[serde(alias = "Ftrl")]
    Ftrl,
    #[serde(alias = "Adam")]
    Adam,
    #[serde(alias = "Momentum")]
    Momentum,
    #[value(name = "rmsprop")]
    #[serde(alias = "RMSProp")]
    RmsProp,
}

impl OptimizerKind {
    /// Instantiates the optimizer with its conventional default hyperparameters
    pub fn build(self) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Sgd => Box::new(SGD::new()),
            OptimizerKind::Adadelta => Box::new(Adadelta::new(0.95, 1e-8)),
            OptimizerKind::Adagrad => Box::new(Adagrad::new(0.1)),
            OptimizerKind::Ftrl => Box::new(Ftrl::new(-0.5, 0.1, 0.0, 0.0)),
            OptimizerKind::Adam => Box::new(Adam::new(0.9, 0.999, 1e-8)),
            OptimizerKind::Momentum => Box::new(Momentum::new(0.9)),
            OptimizerKind::RmsProp => Box::new(RMSProp::new(0.9, 0.0, 1e-10)),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizerKind::Sgd => "SGD",
            OptimizerKind::Adadelta => "Adadelta",
            OptimizerKind::Adagrad => "Adagrad",
            OptimizerKind::Ftrl => "Ftrl",
            OptimizerKind::Adam => "Adam",
            OptimizerKind::Momentum => "Momentum",
            OptimizerKind::RmsProp => "RMSProp",
        };
        f.write_str(name)
    }
}

fn filled_like(params: &[&Tensor], value: f32) -> Vec<Tensor> {
    params
        .iter()
        .map(|p| Tensor::new_with_shape(vec![value; p.data.len()], p.shape))
        .collect()
}

/// Basic Stochastic Gradient Descent optimizer
pub struct SGD;

impl SGD {
    pub fn new() -> Self {
        SGD
    }
}

impl Default for SGD {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for SGD {
    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32) {
        for (param, grad) in params.iter_mut() {
            for (p, g) in param.data.iter_mut().zip(&grad.data) {
                *p -= learning_rate * g;
            }
        }
    }
}

/// Gradient Descent with Momentum
pub struct Momentum {
    /// Momentum coefficient
    momentum: f32,
    /// Velocity vectors for each parameter
    velocities: Vec<Tensor>,
}

impl Momentum {
    pub fn new(momentum: f32) -> Self {
        Momentum {
            momentum,
            velocities: Vec::new(),
        }
    }
}

impl Optimizer for Momentum {
    fn init(&mut self, params: &[&Tensor]) {
        self.velocities = filled_like(params, 0.0);
    }

    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32) {
        for ((param, grad), velocity) in params.iter_mut().zip(self.velocities.iter_mut()) {
            for ((p, g), v) in param
                .data
                .iter_mut()
                .zip(&grad.data)
                .zip(velocity.data.iter_mut())
            {
                *v = self.momentum * *v - learning_rate * g;
                *p += *v;
            }
        }
    }
}

/// Adam optimizer (Adaptive Moment Estimation)
pub struct Adam {
    /// Exponential decay rate for first moment estimates
    beta1: f32,
    /// Exponential decay rate for second moment estimates
    beta2: f32,
    /// Small constant for numerical stability
    epsilon: f32,
    first_moments: Vec<Tensor>,
    second_moments: Vec<Tensor>,
    /// Number of update steps taken
    timestep: i32,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
            timestep: 0,
        }
    }
}

impl Optimizer for Adam {
    fn init(&mut self, params: &[&Tensor]) {
        self.first_moments = filled_like(params, 0.0);
        self.second_moments = filled_like(params, 0.0);
    }

    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32) {
        self.timestep += 1;

        let beta1_correction = 1.0 - self.beta1.powi(self.timestep);
        let beta2_correction = 1.0 - self.beta2.powi(self.timestep);

        for ((param, grad), (m, v)) in params.iter_mut().zip(
            self.first_moments
                .iter_mut()
                .zip(self.second_moments.iter_mut()),
        ) {
            for (((p, &g), m), v) in param
                .data
                .iter_mut()
                .zip(&grad.data)
                .zip(m.data.iter_mut())
                .zip(v.data.iter_mut())
            {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;

                let m_hat = *m / beta1_correction;
                let v_hat = *v / beta2_correction;
                *p -= learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
    }
}

/// Adagrad, per-coordinate step sizes from accumulated squared gradients
pub struct Adagrad {
    initial_accumulator: f32,
    accumulators: Vec<Tensor>,
}

impl Adagrad {
    pub fn new(initial_accumulator: f32) -> Self {
        Adagrad {
            initial_accumulator,
            accumulators: Vec::new(),
        }
    }
}

impl Optimizer for Adagrad {
    fn init(&mut self, params: &[&Tensor]) {
        self.accumulators = filled_like(params, self.initial_accumulator);
    }

    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32) {
        for ((param, grad), accum) in params.iter_mut().zip(self.accumulators.iter_mut()) {
            for ((p, &g), a) in param
                .data
                .iter_mut()
                .zip(&grad.data)
                .zip(accum.data.iter_mut())
            {
                *a += g * g;
                *p -= learning_rate * g / a.sqrt();
            }
        }
    }
}

/// Adadelta, step sizes from running averages of gradients and updates
pub struct Adadelta {
    rho: f32,
    epsilon: f32,
    grad_averages: Vec<Tensor>,
    update_averages: Vec<Tensor>,
}

impl Adadelta {
    pub fn new(rho: f32, epsilon: f32) -> Self {
        Adadelta {
            rho,
            epsilon,
            grad_averages: Vec::new(),
            update_averages: Vec::new(),
        }
    }
}

impl Optimizer for Adadelta {
    fn init(&mut self, params: &[&Tensor]) {
        self.grad_averages = filled_like(params, 0.0);
        self.update_averages = filled_like(params, 0.0);
    }

    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32) {
        let (rho, eps) = (self.rho, self.epsilon);
        for ((param, grad), (grad_avg, update_avg)) in params.iter_mut().zip(
            self.grad_averages
                .iter_mut()
                .zip(self.update_averages.iter_mut()),
        ) {
            for (((p, &g), ga), ua) in param
                .data
                .iter_mut()
                .zip(&grad.data)
                .zip(grad_avg.data.iter_mut())
                .zip(update_avg.data.iter_mut())
            {
                *ga = rho * *ga + (1.0 - rho) * g * g;
                let update = (*ua + eps).sqrt() / (*ga + eps).sqrt() * g;
                *ua = rho * *ua + (1.0 - rho) * update * update;
                *p -= learning_rate * update;
            }
        }
    }
}

/// RMSProp with optional momentum; mean squares start at one
pub struct RMSProp {
    decay: f32,
    momentum: f32,
    epsilon: f32,
    mean_squares: Vec<Tensor>,
    moments: Vec<Tensor>,
}

impl RMSProp {
    pub fn new(decay: f32, momentum: f32, epsilon: f32) -> Self {
        RMSProp {
            decay,
            momentum,
            epsilon,
            mean_squares: Vec::new(),
            moments: Vec::new(),
        }
    }
}

impl Optimizer for RMSProp {
    fn init(&mut self, params: &[&Tensor]) {
        self.mean_squares = filled_like(params, 1.0);
        self.moments = filled_like(params, 0.0);
    }

    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32) {
        for ((param, grad), (ms, mom)) in params
            .iter_mut()
            .zip(self.mean_squares.iter_mut().zip(self.moments.iter_mut()))
        {
            for (((p, &g), ms), mom) in param
                .data
                .iter_mut()
                .zip(&grad.data)
                .zip(ms.data.iter_mut())
                .zip(mom.data.iter_mut())
            {
                *ms = self.decay * *ms + (1.0 - self.decay) * g * g;
                *mom = self.momentum * *mom + learning_rate * g / (*ms + self.epsilon).sqrt();
                *p -= *mom;
            }
        }
    }
}

/// Follow-the-regularized-leader (FTRL-Proximal)
pub struct Ftrl {
    learning_rate_power: f32,
    initial_accumulator: f32,
    l1: f32,
    l2: f32,
    accumulators: Vec<Tensor>,
    linears: Vec<Tensor>,
}

impl Ftrl {
    pub fn new(learning_rate_power: f32, initial_accumulator: f32, l1: f32, l2: f32) -> Self {
        Ftrl {
            learning_rate_power,
            initial_accumulator,
            l1,
            l2,
            accumulators: Vec::new(),
            linears: Vec::new(),
        }
    }
}

impl Optimizer for Ftrl {
    fn init(&mut self, params: &[&Tensor]) {
        self.accumulators = filled_like(params, self.initial_accumulator);
        self.linears = filled_like(params, 0.0);
    }

    fn update_parameters(&mut self, params: &mut [(&mut Tensor, &Tensor)], learning_rate: f32) {
        let power = -self.learning_rate_power;
        for ((param, grad), (accum, linear)) in params
            .iter_mut()
            .zip(self.accumulators.iter_mut().zip(self.linears.iter_mut()))
        {
            for (((w, &g), n), z) in param
                .data
                .iter_mut()
                .zip(&grad.data)
                .zip(accum.data.iter_mut())
                .zip(linear.data.iter_mut())
            {
                let new_n = *n + g * g;
                let sigma = (new_n.powf(power) - n.powf(power)) / learning_rate;
                *z += g - sigma * *w;
                *n = new_n;

                let quadratic = new_n.powf(power) / learning_rate + 2.0 * self.l2;
                *w = if z.abs() > self.l1 {
                    (self.l1 * z.signum() - *z) / quadratic
                } else {
                    0.0
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_close;

    fn single_step(optimizer: &mut dyn Optimizer, learning_rate: f32) -> f32 {
        let mut param = Tensor::new(vec![1.0]);
        let grad = Tensor::new(vec![0.5]);
        optimizer.init(&[&param]);
        optimizer.update_parameters(&mut [(&mut param, &grad)], learning_rate);
        param.data[0]
    }

    #[test]
    fn test_sgd_step() {
        assert_close(single_step(&mut SGD::new(), 0.1), 0.95, 1e-6);
    }

    #[test]
    fn test_momentum_accumulates_velocity() {
        let mut optimizer = Momentum::new(0.9);
        let mut param = Tensor::new(vec![1.0]);
        let grad = Tensor::new(vec![1.0]);
        optimizer.init(&[&param]);

        optimizer.update_parameters(&mut [(&mut param, &grad)], 0.1);
        assert_close(param.data[0], 0.9, 1e-6);
        optimizer.update_parameters(&mut [(&mut param, &grad)], 0.1);
        assert_close(param.data[0], 0.71, 1e-6);
    }

    #[test]
    fn test_adam_first_step_is_learning_rate() {
        assert_close(single_step(&mut Adam::new(0.9, 0.999, 1e-8), 0.1), 0.9, 1e-5);
    }

    #[test]
    fn test_adagrad_step() {
        let expected = 1.0 - 0.1 * 0.5 / 0.35f32.sqrt();
        assert_close(single_step(&mut Adagrad::new(0.1), 0.1), expected, 1e-6);
    }

    #[test]
    fn test_ftrl_step() {
        let sigma = (0.35f32.sqrt() - 0.1f32.sqrt()) / 0.1;
        let z = 0.5 - sigma;
        let expected = -z / (0.35f32.sqrt() / 0.1);
        assert_close(
            single_step(&mut Ftrl::new(-0.5, 0.1, 0.0, 0.0), 0.1),
            expected,
            1e-5,
        );
    }

    #[test]
    fn test_ftrl_l1_zeroes_small_weights() {
        assert_eq!(single_step(&mut Ftrl::new(-0.5, 0.1, 100.0, 0.0), 0.1), 0.0);
    }

    #[test]
    fn test_every_kind_descends() {
        for kind in OptimizerKind::value_variants() {
            let mut optimizer = kind.build();
            let updated = single_step(optimizer.as_mut(), 0.1);
            assert!(updated < 1.0, "{} did not descend: {}", kind, updated);
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            OptimizerKind::from_str("rmsprop", true).unwrap(),
            OptimizerKind::RmsProp
        );
        assert_eq!(
            OptimizerKind::from_str("SGD", true).unwrap(),
            OptimizerKind::Sgd
        );
        let kind: OptimizerKind = serde_json::from_str("\"RMSProp\"").unwrap();
        assert_eq!(kind, OptimizerKind::RmsProp);
        let kind: OptimizerKind = serde_json::from_str("\"adam\"").unwrap();
        assert_eq!(kind, OptimizerKind::Adam);
        assert_eq!(OptimizerKind::Ftrl.to_string(), "Ftrl");
    }
}
