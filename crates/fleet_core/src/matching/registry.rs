use std::fmt;
use std::str::FromStr;

use crate::error::SimError;
use crate::scenario::NamedParams;

use super::algorithm::DispatchAlgorithm;
use super::bearing::GroupByBearing;
use super::distributed::{DistributedConfig, DistributedDispatch};
use super::random_seat::FillRandomSeat;
use super::simple::NearestTaxi;

/// The dispatch policies available by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    Nearest,
    FillRandomSeat,
    GroupByBearing,
    Distributed,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 4] = [
        AlgorithmKind::Nearest,
        AlgorithmKind::FillRandomSeat,
        AlgorithmKind::GroupByBearing,
        AlgorithmKind::Distributed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::Nearest => "nearest",
            AlgorithmKind::FillRandomSeat => "fill-random-seat",
            AlgorithmKind::GroupByBearing => "group-by-bearing",
            AlgorithmKind::Distributed => "distributed",
        }
    }

    pub fn build(self, params: &NamedParams) -> Result<Box<dyn DispatchAlgorithm>, SimError> {
        Ok(match self {
            AlgorithmKind::Nearest => Box::new(NearestTaxi),
            AlgorithmKind::FillRandomSeat => Box::new(FillRandomSeat::from_params(params)?),
            AlgorithmKind::GroupByBearing => Box::new(GroupByBearing::from_params(params)),
            AlgorithmKind::Distributed => Box::new(DistributedDispatch::new(
                DistributedConfig::from_params(params)?,
            )),
        })
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SimError::UnknownAlgorithm(s.to_string()))
    }
}
