//! NeuronModel - Facade Enum
//!
//! The way the experiment driver and the binary pick a neuron model. The
//! concrete cell types stay reachable for tests and custom tables.

use super::{
    BarrelCell, CellClass, NeuronAdapter, NeuronSnapshot, ParameterTable, Recording,
    WangBuzsakiNeuron,
};
use crate::error::Result;
use crate::injection::Injection;

/// Neuron model variants
#[derive(Clone, Debug)]
pub enum NeuronModel {
    /// Barrel-cortex Hodgkin-Huxley cell (PC or IN table)
    Barrel(BarrelCell),
    /// Wang-Buzsaki interneuron
    WangBuzsaki(WangBuzsakiNeuron),
}

impl NeuronModel {
    /// Barrel-cortex cell with built-in parameter sets
    pub fn barrel(class: CellClass) -> Self {
        Self::Barrel(BarrelCell::new(class))
    }

    /// Barrel-cortex cell with a loaded parameter table
    pub fn barrel_with_table(class: CellClass, table: ParameterTable) -> Result<Self> {
        BarrelCell::with_table(class, table).map(Self::Barrel)
    }

    pub fn wang_buzsaki() -> Self {
        Self::WangBuzsaki(WangBuzsakiNeuron::new())
    }

    /// Get model type name
    pub fn model_type(&self) -> &'static str {
        match self {
            Self::Barrel(_) => "Barrel",
            Self::WangBuzsaki(_) => "WangBuzsaki",
        }
    }

    pub fn is_barrel(&self) -> bool {
        matches!(self, Self::Barrel(_))
    }
}

impl NeuronAdapter for NeuronModel {
    fn simulate(&mut self, injection: &Injection, duration: f64, parameter_set: usize) -> Result<Recording> {
        match self {
            Self::Barrel(n) => n.simulate(injection, duration, parameter_set),
            Self::WangBuzsaki(n) => n.simulate(injection, duration, parameter_set),
        }
    }

    fn snapshot(&self) -> NeuronSnapshot {
        match self {
            Self::Barrel(n) => n.snapshot(),
            Self::WangBuzsaki(n) => n.snapshot(),
        }
    }

    fn restore(&mut self, snapshot: &NeuronSnapshot) -> Result<()> {
        match self {
            Self::Barrel(n) => n.restore(snapshot),
            Self::WangBuzsaki(n) => n.restore(snapshot),
        }
    }

    fn parameter_sets(&self) -> usize {
        match self {
            Self::Barrel(n) => n.parameter_sets(),
            Self::WangBuzsaki(n) => n.parameter_sets(),
        }
    }

    fn membrane(&self) -> f64 {
        match self {
            Self::Barrel(n) => n.membrane(),
            Self::WangBuzsaki(n) => n.membrane(),
        }
    }

    fn model_name(&self) -> &'static str {
        match self {
            Self::Barrel(n) => n.model_name(),
            Self::WangBuzsaki(n) => n.model_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_barrel() {
        let mut neuron = NeuronModel::barrel(CellClass::Interneuron);
        assert_eq!(neuron.model_type(), "Barrel");
        assert_eq!(neuron.model_name(), "BarrelIN");
        assert!(neuron.is_barrel());
        assert_eq!(neuron.parameter_sets(), 3);

        let rec = neuron
            .simulate(&Injection::constant_current(0.0, 0.5, 10.0), 10.0, 0)
            .unwrap();
        assert_eq!(rec.voltage.len(), 20);
    }

    #[test]
    fn test_facade_wang_buzsaki() {
        let neuron = NeuronModel::wang_buzsaki();
        assert_eq!(neuron.model_type(), "WangBuzsaki");
        assert!(!neuron.is_barrel());
        assert_eq!(neuron.membrane(), -70.0);
    }

    #[test]
    fn test_cross_model_restore_fails() {
        let wb = NeuronModel::wang_buzsaki();
        let mut barrel = NeuronModel::barrel(CellClass::Pyramidal);
        assert!(barrel.restore(&wb.snapshot()).is_err());
    }

    #[test]
    fn test_custom_table() {
        let table = ParameterTable::from_csv_str("0.01\n1.0\n0.2\n10\n7\n7\n-45\n").unwrap();
        let neuron = NeuronModel::barrel_with_table(CellClass::Pyramidal, table).unwrap();
        assert_eq!(neuron.parameter_sets(), 1);
    }
}
