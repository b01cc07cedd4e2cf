use alloy::primitives::{keccak256, Address};
use std::collections::HashMap;

use crate::models::{LogCoordinate, RawWagerEvent, SchemaVersion};

use super::wager::{CreateParams, EscrowError, EscrowWager};

/// Deploys wager contracts at deterministic addresses and announces them for
/// indexer discovery. New wagers always get the factory's current
/// implementation version; already-deployed wagers keep their original rules
/// forever.
#[derive(Debug)]
pub struct WagerFactory {
    implementation_version: SchemaVersion,
    wagers: HashMap<Address, EscrowWager>,
}

impl WagerFactory {
    pub fn new(implementation_version: SchemaVersion) -> Self {
        Self {
            implementation_version,
            wagers: HashMap::new(),
        }
    }

    pub fn implementation_version(&self) -> SchemaVersion {
        self.implementation_version
    }

    /// Point new deployments at a different rule set.
    pub fn set_implementation_version(&mut self, version: SchemaVersion) {
        self.implementation_version = version;
    }

    /// Deterministic child address from the creation parameters, so callers
    /// can pre-authorize transfers to it before deployment. Pure; no state.
    pub fn predict_address(maker: Address, taker: Address, accept_by: u64, deadline: u64) -> Address {
        let mut preimage = Vec::with_capacity(20 + 20 + 8 + 8);
        preimage.extend_from_slice(maker.as_slice());
        preimage.extend_from_slice(taker.as_slice());
        preimage.extend_from_slice(&accept_by.to_be_bytes());
        preimage.extend_from_slice(&deadline.to_be_bytes());
        let digest = keccak256(&preimage);
        Address::from_slice(&digest[12..])
    }

    /// Deploy a wager under the current implementation version. Fails with
    /// `FailedDeployment` when the derived address is already taken, i.e. a
    /// wager with identical parameters exists.
    pub fn create_wager(&mut self, params: CreateParams, now: u64) -> Result<Address, EscrowError> {
        let address =
            Self::predict_address(params.maker, params.taker, params.accept_by, params.deadline);
        if self.wagers.contains_key(&address) {
            return Err(EscrowError::FailedDeployment(address));
        }

        let wager = EscrowWager::create(address, self.implementation_version, params, now)?;
        self.wagers.insert(address, wager);
        Ok(address)
    }

    pub fn wager(&self, address: Address) -> Option<&EscrowWager> {
        self.wagers.get(&address)
    }

    pub fn wager_mut(&mut self, address: Address) -> Option<&mut EscrowWager> {
        self.wagers.get_mut(&address)
    }

    /// The registration message the indexer consumes for dynamic discovery.
    pub fn deployment_event(
        &self,
        address: Address,
        coordinate: LogCoordinate,
    ) -> Option<RawWagerEvent> {
        self.wagers.get(&address).map(|w| RawWagerEvent::Deployed {
            coordinate,
            wager: address,
            schema_tag: w.version.as_u8(),
            block_time: w.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn params() -> CreateParams {
        CreateParams {
            maker: addr(1),
            taker: addr(2),
            judge: addr(3),
            asset: addr(4),
            maker_stake: U256::from(100u64),
            taker_stake: U256::from(100u64),
            accept_by: 1_000,
            deadline: 10_000,
            description: String::new(),
        }
    }

    #[test]
    fn predicted_address_is_deterministic_and_param_sensitive() {
        let a = WagerFactory::predict_address(addr(1), addr(2), 1_000, 10_000);
        let b = WagerFactory::predict_address(addr(1), addr(2), 1_000, 10_000);
        assert_eq!(a, b);

        let c = WagerFactory::predict_address(addr(1), addr(2), 1_001, 10_000);
        assert_ne!(a, c);
    }

    #[test]
    fn deployment_lands_at_the_predicted_address() {
        let mut factory = WagerFactory::new(SchemaVersion::V1);
        let predicted = WagerFactory::predict_address(addr(1), addr(2), 1_000, 10_000);
        let deployed = factory.create_wager(params(), 100).unwrap();
        assert_eq!(deployed, predicted);
        assert!(factory.wager(deployed).is_some());
    }

    #[test]
    fn duplicate_parameters_fail_deployment() {
        let mut factory = WagerFactory::new(SchemaVersion::V1);
        let first = factory.create_wager(params(), 100).unwrap();
        assert_eq!(
            factory.create_wager(params(), 100).unwrap_err(),
            EscrowError::FailedDeployment(first)
        );
    }

    #[test]
    fn version_pointer_only_affects_new_deployments() {
        let mut factory = WagerFactory::new(SchemaVersion::V1);
        let old = factory.create_wager(params(), 100).unwrap();

        factory.set_implementation_version(SchemaVersion::V2);
        let mut p = params();
        p.accept_by = 2_000; // different params, different address
        let new = factory.create_wager(p, 100).unwrap();

        assert_eq!(factory.wager(old).unwrap().version, SchemaVersion::V1);
        assert_eq!(factory.wager(new).unwrap().version, SchemaVersion::V2);
    }

    #[test]
    fn deployment_event_carries_the_schema_tag() {
        let mut factory = WagerFactory::new(SchemaVersion::V2);
        let address = factory.create_wager(params(), 100).unwrap();
        let event = factory
            .deployment_event(address, LogCoordinate::new("0xaa", 0))
            .unwrap();
        match event {
            RawWagerEvent::Deployed { wager, schema_tag, .. } => {
                assert_eq!(wager, address);
                assert_eq!(schema_tag, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
