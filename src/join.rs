//! Dynamic group membership.
//!
//! A group acts as a single party identifier whose secret is the sum of its
//! members' secrets. Founding a group aggregates the founders' public and
//! evaluation keys, then sums their switching-key contributions (each
//! anchored to the group public key) into the aggregate switching key.
//!
//! # Joining
//! 1. The newcomer generates ordinary keys under the group identifier
//! 2. Group public and evaluation keys absorb the newcomer's by addition
//! 3. The newcomer's auxiliary key turns the aggregate switching key into a
//!    join key valid from the old group secret to the new one
//! 4. The aggregate switching key becomes the join key plus the newcomer's
//!    own contribution, so the next join starts from a valid aggregate
//! 5. Every outstanding ciphertext is re-keyed with the join key
//!
//! No existing member's secret is involved at any step. [`join_group`]
//! stages all of it and commits only once every step has succeeded.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use crate::{
    ciphertext::Ciphertext,
    errors::{MkError, MkResult},
    evaluator::Evaluator,
    keygen::{KeyGenerator, aggregate},
    keys::{
        ConjugationKey, ConjugationKeySet, KeyKind, PartyId, PublicKey, PublicKeySet,
        RelinearizationKey, RelinearizationKeySet, RotationKey, RotationKeySet, SecretKey,
        SwitchingKey, secret_key::check_party,
    },
};

/// Keys a party publishes: everything except its secret.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberPublicKeys<const DEGREE: usize> {
    public_key: PublicKey<DEGREE>,
    relinearization_key: RelinearizationKey<DEGREE>,
    rotation_keys: BTreeMap<usize, RotationKey<DEGREE>>,
    conjugation_key: ConjugationKey<DEGREE>,
}

impl<const DEGREE: usize> MemberPublicKeys<DEGREE> {
    pub fn id(&self) -> &PartyId {
        self.public_key.id()
    }

    pub fn public_key(&self) -> &PublicKey<DEGREE> {
        &self.public_key
    }

    pub fn relinearization_key(&self) -> &RelinearizationKey<DEGREE> {
        &self.relinearization_key
    }

    pub fn rotation_key(&self, rotation: usize) -> Option<&RotationKey<DEGREE>> {
        self.rotation_keys.get(&rotation)
    }

    pub fn conjugation_key(&self) -> &ConjugationKey<DEGREE> {
        &self.conjugation_key
    }
}

/// A party's full key material, generated locally.
#[derive(Debug, Clone)]
pub struct MemberKeys<const DEGREE: usize> {
    secret_key: SecretKey<DEGREE>,
    public: MemberPublicKeys<DEGREE>,
}

impl<const DEGREE: usize> MemberKeys<DEGREE> {
    /// Generates a secret key and every evaluation key the parameters
    /// provision CRS entries for.
    pub fn generate(kg: &mut KeyGenerator<DEGREE>, id: impl Into<PartyId>) -> MkResult<Self> {
        let secret_key = kg.gen_secret_key(id)?;
        let public_key = kg.gen_public_key(&secret_key)?;
        let relinearization_key = kg.gen_relinearization_key(&secret_key)?;
        let rotations: Vec<usize> = kg.params().rotations().collect();
        let rotation_keys = rotations
            .into_iter()
            .map(|r| Ok((r, kg.gen_rotation_key(r, &secret_key)?)))
            .collect::<MkResult<_>>()?;
        let conjugation_key = kg.gen_conjugation_key(&secret_key)?;
        Ok(Self {
            secret_key,
            public: MemberPublicKeys {
                public_key,
                relinearization_key,
                rotation_keys,
                conjugation_key,
            },
        })
    }

    pub fn id(&self) -> &PartyId {
        self.secret_key.id()
    }

    pub fn secret_key(&self) -> &SecretKey<DEGREE> {
        &self.secret_key
    }

    pub fn public(&self) -> &MemberPublicKeys<DEGREE> {
        &self.public
    }

    /// Registers this party's own keys, for a party acting alone.
    pub fn publish_into(&self, registry: &mut KeyRegistry<DEGREE>) -> MkResult<()> {
        registry.public_keys.insert(self.public.public_key.clone())?;
        registry
            .relinearization_keys
            .insert(self.public.relinearization_key.clone())?;
        for key in self.public.rotation_keys.values() {
            registry.rotation_keys.insert(key.clone())?;
        }
        registry
            .conjugation_keys
            .insert(self.public.conjugation_key.clone())?;
        Ok(())
    }
}

/// Public and evaluation keys of every identifier an evaluator may meet.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry<const DEGREE: usize> {
    pub public_keys: PublicKeySet<DEGREE>,
    pub relinearization_keys: RelinearizationKeySet<DEGREE>,
    pub rotation_keys: RotationKeySet<DEGREE>,
    pub conjugation_keys: ConjugationKeySet<DEGREE>,
}

impl<const DEGREE: usize> KeyRegistry<DEGREE> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Aggregated founder keys, waiting for the founders' switching-key
/// contributions.
#[derive(Debug, Clone)]
pub struct GroupSetup<const DEGREE: usize> {
    member_count: usize,
    public: MemberPublicKeys<DEGREE>,
}

impl<const DEGREE: usize> GroupSetup<DEGREE> {
    pub fn new(founders: &[MemberPublicKeys<DEGREE>]) -> MkResult<Self> {
        let (first, rest) = founders.split_first().ok_or(MkError::EmptyKeyList)?;
        let mut public = first.clone();
        for founder in rest {
            absorb(&mut public, founder)?;
        }
        info!(group = %public.id(), founders = founders.len(), "group keys aggregated");
        Ok(Self {
            member_count: founders.len(),
            public,
        })
    }

    pub fn id(&self) -> &PartyId {
        self.public.id()
    }

    /// The key every founder anchors its switching-key contribution to.
    pub fn group_public_key(&self) -> &PublicKey<DEGREE> {
        &self.public.public_key
    }

    /// Sums one contribution per founder into the aggregate switching key.
    pub fn finish(self, contributions: &[SwitchingKey<DEGREE>]) -> MkResult<GroupKeys<DEGREE>> {
        if contributions.len() != self.member_count {
            return Err(MkError::ContributionCount {
                expected: self.member_count,
                actual: contributions.len(),
            });
        }
        let switching_key = aggregate(contributions, SwitchingKey::accumulate)?;
        check_party(self.id(), switching_key.id())?;
        Ok(GroupKeys {
            member_count: self.member_count,
            public: self.public,
            switching_key,
        })
    }
}

/// The public state of an operating group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKeys<const DEGREE: usize> {
    member_count: usize,
    public: MemberPublicKeys<DEGREE>,
    switching_key: SwitchingKey<DEGREE>,
}

impl<const DEGREE: usize> GroupKeys<DEGREE> {
    pub fn id(&self) -> &PartyId {
        self.public.id()
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }

    pub fn public_keys(&self) -> &MemberPublicKeys<DEGREE> {
        &self.public
    }

    /// Aggregate switching key: `body + head·s_group ≈ P·s_group·g`.
    pub fn switching_key(&self) -> &SwitchingKey<DEGREE> {
        &self.switching_key
    }

    /// Writes the group's aggregate keys into `registry`, overwriting the
    /// entries of a previous membership.
    pub fn publish_into(&self, registry: &mut KeyRegistry<DEGREE>) {
        registry.public_keys.replace(self.public.public_key.clone());
        registry
            .relinearization_keys
            .replace(self.public.relinearization_key.clone());
        for key in self.public.rotation_keys.values() {
            registry.rotation_keys.replace(key.clone());
        }
        registry
            .conjugation_keys
            .replace(self.public.conjugation_key.clone());
    }

    /// Run by the newcomer. Reads only the group's public state and the
    /// newcomer's own keys.
    pub fn join_request(
        &self,
        kg: &mut KeyGenerator<DEGREE>,
        newcomer: &MemberKeys<DEGREE>,
    ) -> MkResult<JoinRequest<DEGREE>> {
        check_party(self.id(), newcomer.id())?;
        let uaux = kg.uaux_key_gen(self.switching_key.head(), newcomer.secret_key());
        let mut updated_pk = self.public.public_key.clone();
        updated_pk.accumulate(&newcomer.public.public_key)?;
        let swk = kg.gen_swk(newcomer.secret_key(), &updated_pk);
        Ok(JoinRequest {
            keys: newcomer.public.clone(),
            uaux,
            swk,
        })
    }

    /// Applies steps 2 to 4 and returns the join key.
    fn admit(&mut self, request: &JoinRequest<DEGREE>) -> MkResult<SwitchingKey<DEGREE>> {
        check_party(self.id(), request.uaux.id())?;
        check_party(self.id(), request.swk.id())?;
        if request.uaux.head() != self.switching_key.head() {
            return Err(MkError::StaleJoinRequest);
        }
        absorb(&mut self.public, &request.keys)?;

        let mut join_body = self.switching_key.body().clone();
        join_body += request.uaux.body();
        let join_key = SwitchingKey::new(
            self.id().clone(),
            join_body,
            self.switching_key.head().clone(),
        );

        let mut next = join_key.clone();
        next.accumulate(&request.swk)?;
        self.switching_key = next;
        self.member_count += 1;
        Ok(join_key)
    }
}

/// What a newcomer sends to the group.
#[derive(Debug, Clone)]
pub struct JoinRequest<const DEGREE: usize> {
    keys: MemberPublicKeys<DEGREE>,
    uaux: SwitchingKey<DEGREE>,
    swk: SwitchingKey<DEGREE>,
}

impl<const DEGREE: usize> JoinRequest<DEGREE> {
    pub fn keys(&self) -> &MemberPublicKeys<DEGREE> {
        &self.keys
    }

    pub fn uaux(&self) -> &SwitchingKey<DEGREE> {
        &self.uaux
    }

    /// The newcomer's switching-key contribution, anchored to the group
    /// public key that already includes the newcomer.
    pub fn swk(&self) -> &SwitchingKey<DEGREE> {
        &self.swk
    }
}

/// Admits the sender of `request` into `group` and re-keys every
/// ciphertext of `outstanding` that carries the group's component.
///
/// On error neither `group` nor `outstanding` is modified. Returns the join
/// key used for re-keying.
#[instrument(skip_all, fields(group = %group.id(), members = group.member_count()))]
pub fn join_group<const DEGREE: usize>(
    evaluator: &Evaluator<DEGREE>,
    group: &mut GroupKeys<DEGREE>,
    request: &JoinRequest<DEGREE>,
    outstanding: &mut [Ciphertext<DEGREE>],
) -> MkResult<SwitchingKey<DEGREE>> {
    let mut staged = group.clone();
    let join_key = staged.admit(request)?;

    let rekeyed = outstanding
        .iter()
        .map(|ct| {
            if ct.contains(staged.id()) {
                evaluator.key_switch_new(ct, &join_key).map(Some)
            } else {
                Ok(None)
            }
        })
        .collect::<MkResult<Vec<_>>>()?;

    let mut count = 0;
    for (slot, ct) in outstanding.iter_mut().zip(rekeyed) {
        if let Some(ct) = ct {
            *slot = ct;
            count += 1;
        }
    }
    debug!(rekeyed = count, skipped = outstanding.len() - count, "outstanding ciphertexts");
    *group = staged;
    info!(members = group.member_count(), "party admitted");
    Ok(join_key)
}

/// Adds `newcomer`'s public and evaluation keys into `group`.
fn absorb<const DEGREE: usize>(
    group: &mut MemberPublicKeys<DEGREE>,
    newcomer: &MemberPublicKeys<DEGREE>,
) -> MkResult<()> {
    let mut next = group.clone();
    next.public_key.accumulate(&newcomer.public_key)?;
    next.relinearization_key
        .accumulate(&newcomer.relinearization_key)?;
    for (rotation, key) in next.rotation_keys.iter_mut() {
        let other = newcomer
            .rotation_keys
            .get(rotation)
            .ok_or_else(|| MkError::MissingEvaluationKey {
                kind: RotationKey::<DEGREE>::KIND,
                id: newcomer.id().clone(),
            })?;
        key.accumulate(other)?;
    }
    next.conjugation_key
        .accumulate(&newcomer.conjugation_key)?;
    *group = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    const D: usize = 16;

    fn keygen() -> KeyGenerator<D> {
        let params = Parameters::<D>::builder()
            .log_q(&[50, 40])
            .log_p(&[55])
            .rotations(&[1])
            .build()
            .unwrap();
        KeyGenerator::from_seed(params, [11u8; 32])
    }

    fn found(kg: &mut KeyGenerator<D>, founders: &[MemberKeys<D>]) -> GroupKeys<D> {
        let public: Vec<_> = founders.iter().map(|m| m.public().clone()).collect();
        let setup = GroupSetup::new(&public).unwrap();
        let contributions: Vec<_> = founders
            .iter()
            .map(|m| kg.gen_swk(m.secret_key(), setup.group_public_key()))
            .collect();
        setup.finish(&contributions).unwrap()
    }

    #[test]
    fn setup_requires_one_contribution_per_founder() {
        let mut kg = keygen();
        let a = MemberKeys::generate(&mut kg, "g").unwrap();
        let b = MemberKeys::generate(&mut kg, "g").unwrap();
        let setup = GroupSetup::new(&[a.public().clone(), b.public().clone()]).unwrap();
        let only_a = kg.gen_swk(a.secret_key(), setup.group_public_key());
        assert_eq!(
            setup.finish(&[only_a]).unwrap_err(),
            MkError::ContributionCount {
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(
            GroupSetup::<D>::new(&[]).unwrap_err(),
            MkError::EmptyKeyList
        );
    }

    #[test]
    fn newcomer_must_use_the_group_identifier() {
        let mut kg = keygen();
        let founders = [
            MemberKeys::generate(&mut kg, "g").unwrap(),
            MemberKeys::generate(&mut kg, "g").unwrap(),
        ];
        let group = found(&mut kg, &founders);
        let outsider = MemberKeys::generate(&mut kg, "h").unwrap();
        assert!(matches!(
            group.join_request(&mut kg, &outsider),
            Err(MkError::PartyMismatch { .. })
        ));
    }

    #[test]
    fn stale_request_leaves_the_group_untouched() {
        let mut kg = keygen();
        let founders = [
            MemberKeys::generate(&mut kg, "g").unwrap(),
            MemberKeys::generate(&mut kg, "g").unwrap(),
        ];
        let mut group = found(&mut kg, &founders);
        let eval = Evaluator::new(kg.params().clone());

        let first = MemberKeys::generate(&mut kg, "g").unwrap();
        let second = MemberKeys::generate(&mut kg, "g").unwrap();
        let request_first = group.join_request(&mut kg, &first).unwrap();
        let request_second = group.join_request(&mut kg, &second).unwrap();

        join_group(&eval, &mut group, &request_first, &mut []).unwrap();
        assert_eq!(group.member_count(), 3);

        let before = group.clone();
        assert_eq!(
            join_group(&eval, &mut group, &request_second, &mut []).unwrap_err(),
            MkError::StaleJoinRequest
        );
        assert_eq!(group, before);
    }

    #[test]
    fn publishing_replaces_previous_group_keys() {
        let mut kg = keygen();
        let founders = [
            MemberKeys::generate(&mut kg, "g").unwrap(),
            MemberKeys::generate(&mut kg, "g").unwrap(),
        ];
        let mut group = found(&mut kg, &founders);
        let mut registry = KeyRegistry::new();
        group.publish_into(&mut registry);

        let newcomer = MemberKeys::generate(&mut kg, "g").unwrap();
        let request = group.join_request(&mut kg, &newcomer).unwrap();
        let eval = Evaluator::new(kg.params().clone());
        join_group(&eval, &mut group, &request, &mut []).unwrap();
        group.publish_into(&mut registry);

        assert_eq!(registry.public_keys.len(), 1);
        assert_eq!(registry.rotation_keys.len(), 1);
        assert_eq!(
            registry.public_keys.get(group.id()),
            Some(group.public_keys().public_key())
        );
    }
}
