use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};

use super::{Aligned, Evaluator};
use crate::{
    ciphertext::Ciphertext,
    errors::{MkError, MkResult},
    keys::{PartyId, RelinearizationKey, RelinearizationKeySet},
    params::CrsTarget,
    rings::{RnsPoly, divide_by_tail},
};

impl<const DEGREE: usize> Evaluator<DEGREE> {
    /// Tensor product followed by relinearization.
    ///
    /// The output carries one component per party of `ids(lhs) ∪ ids(rhs)`
    /// and the product of the input scales. Every party in the union needs a
    /// relinearization key in `rlks`.
    #[instrument(skip_all, fields(lhs = lhs.party_count(), rhs = rhs.party_count()))]
    pub fn mul_relin_new(
        &self,
        lhs: &Ciphertext<DEGREE>,
        rhs: &Ciphertext<DEGREE>,
        rlks: &RelinearizationKeySet<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let level = lhs.level().min(rhs.level());
        let a = self.align(lhs, level)?;
        let b = self.align(rhs, level)?;

        let ids: BTreeSet<PartyId> = a.parties.keys().chain(b.parties.keys()).cloned().collect();
        let keys = ids
            .iter()
            .map(|id| Ok((id.clone(), rlks.require(id)?)))
            .collect::<MkResult<BTreeMap<_, _>>>()?;

        let zero = RnsPoly::zero_in(self.params.q_basis(level).clone(), true);
        let common = &a.common * &b.common;

        let mut linear = BTreeMap::new();
        for id in &ids {
            let mut term = zero.clone();
            if let Some(y) = b.parties.get(id) {
                term.mul_add_assign(&a.common, y);
            }
            if let Some(x) = a.parties.get(id) {
                term.mul_add_assign(x, &b.common);
            }
            linear.insert(id.clone(), term);
        }

        // coefficient of s_i·s_j, one entry per unordered pair
        let mut quadratic: BTreeMap<(PartyId, PartyId), RnsPoly<DEGREE>> = BTreeMap::new();
        for (i, x) in &a.parties {
            for (j, y) in &b.parties {
                let pair = if i <= j {
                    (i.clone(), j.clone())
                } else {
                    (j.clone(), i.clone())
                };
                quadratic
                    .entry(pair)
                    .or_insert_with(|| zero.clone())
                    .mul_add_assign(x, y);
            }
        }
        debug!(
            level,
            parties = ids.len(),
            pairs = quadratic.len(),
            "relinearizing tensor product"
        );

        let common = self.relinearize(level, common, &mut linear, quadratic, &keys)?;
        Ok(Ciphertext::new_unchecked(
            common,
            linear,
            lhs.scale() * rhs.scale(),
        ))
    }

    /// Folds every quadratic term into the common and linear components.
    ///
    /// For the term `c·s_i·s_j`, with `D` the decomposition of `c`:
    /// `<D, d_i>` goes to party `j` and `<D, b_j>` is collected into `Y_i`.
    /// Each `Y_i` is then divided by `P`, decomposed into `E`, and
    /// `<E, v_i>`, `<E, u>` go to the common component and party `i`.
    fn relinearize(
        &self,
        level: usize,
        mut common: RnsPoly<DEGREE>,
        linear: &mut BTreeMap<PartyId, RnsPoly<DEGREE>>,
        quadratic: BTreeMap<(PartyId, PartyId), RnsPoly<DEGREE>>,
        keys: &BTreeMap<PartyId, &RelinearizationKey<DEGREE>>,
    ) -> MkResult<RnsPoly<DEGREE>> {
        let switcher = &self.switcher;
        let u = self.params.crs(CrsTarget::Relinearization)?;
        let zero = RnsPoly::zero_in(switcher.qp_basis(level).clone(), true);
        let key = |id: &PartyId| {
            keys.get(id).copied().ok_or_else(|| MkError::MissingEvaluationKey {
                kind: "relinearization",
                id: id.clone(),
            })
        };

        let mut acc_common = zero.clone();
        let mut acc: BTreeMap<PartyId, RnsPoly<DEGREE>> = BTreeMap::new();
        let mut y: BTreeMap<PartyId, RnsPoly<DEGREE>> = BTreeMap::new();

        for ((i, j), coefficient) in quadratic {
            let digits = switcher.decompose(&coefficient)?;
            let to_j = switcher.inner_product(&digits, key(&i)?.d().digits())?;
            *acc.entry(j.clone()).or_insert_with(|| zero.clone()) += &to_j;
            let y_i = switcher.inner_product(&digits, key(&j)?.b().digits())?;
            *y.entry(i).or_insert_with(|| zero.clone()) += &y_i;
        }

        for (i, y_i) in y {
            let digits = switcher.decompose(&switcher.mod_down(&y_i)?)?;
            acc_common += &switcher.inner_product(&digits, key(&i)?.v().digits())?;
            *acc.entry(i).or_insert_with(|| zero.clone()) += &switcher.inner_product(&digits, u)?;
        }

        common += &switcher.mod_down(&acc_common)?;
        for (id, poly) in acc {
            let reduced = switcher.mod_down(&poly)?;
            match linear.get_mut(&id) {
                Some(component) => *component += &reduced,
                None => {
                    linear.insert(id, reduced);
                }
            }
        }
        Ok(common)
    }

    /// Divides every component by the last prime of the current level and
    /// the scale by the same prime.
    pub fn rescale_new(&self, ct: &Ciphertext<DEGREE>) -> MkResult<Ciphertext<DEGREE>> {
        let level = ct.level();
        if level == 0 {
            return Err(MkError::LevelExhausted);
        }
        let Aligned { common, parties } = self.align(ct, level)?;
        let target = self.params.q_basis(level - 1);
        let common = divide_by_tail(&common, target)?;
        let parties = parties
            .into_iter()
            .map(|(id, poly)| Ok((id, divide_by_tail(&poly, target)?)))
            .collect::<MkResult<_>>()?;
        let dropped = self.params.q_moduli()[level] as f64;
        Ok(Ciphertext::new_unchecked(
            common,
            parties,
            ct.scale() / dropped,
        ))
    }

    /// Multiplies all `cts` by pairwise reduction, using `⌈log₂ n⌉`
    /// multiplicative levels instead of `n - 1`. An odd element is carried
    /// into the next round unchanged.
    #[instrument(skip_all, fields(count = cts.len(), rescale = rescale))]
    pub fn mul_relin_tree(
        &self,
        cts: &[Ciphertext<DEGREE>],
        rlks: &RelinearizationKeySet<DEGREE>,
        rescale: bool,
    ) -> MkResult<Ciphertext<DEGREE>> {
        if cts.is_empty() {
            return Err(MkError::EmptyCiphertextList);
        }
        let mut layer = cts.to_vec();
        let mut round = 0;
        while layer.len() > 1 {
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            let mut iter = layer.into_iter();
            while let Some(lhs) = iter.next() {
                match iter.next() {
                    Some(rhs) => {
                        let product = self.mul_relin_new(&lhs, &rhs, rlks)?;
                        next.push(if rescale {
                            self.rescale_new(&product)?
                        } else {
                            product
                        });
                    }
                    None => next.push(lhs),
                }
            }
            round += 1;
            debug!(round, width = next.len(), "product tree round");
            layer = next;
        }
        Ok(layer.remove(0))
    }
}
