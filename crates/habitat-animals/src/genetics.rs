//! Gene inheritance.

use habitat_types::Genes;
use rand::Rng;

fn shift(range: f32, rng: &mut impl Rng) -> f32 {
    if range > 0.0 {
        rng.random_range(-range..=range)
    } else {
        0.0
    }
}

/// Offspring genes: the parents' average plus a uniform shift of at most
/// `mutation` per gene, clamped to the gene bounds.
pub fn blend_genes(a: &Genes, b: &Genes, mutation: f32, rng: &mut impl Rng) -> Genes {
    let mut out = [0.0; 5];
    for ((slot, x), y) in out.iter_mut().zip(a.to_array()).zip(b.to_array()) {
        *slot = (x + y).mul_add(0.5, shift(mutation, rng));
    }
    Genes::from_array(out)
}

/// Genes for a spawned founder: each gene `1.0` shifted by at most
/// `mutation`.
pub fn founder_genes(mutation: f32, rng: &mut impl Rng) -> Genes {
    Genes::from_array([(); 5].map(|()| 1.0 + shift(mutation, rng)))
}
