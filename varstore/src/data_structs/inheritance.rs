//! Mendelian classification of one allele in a parents/child trio.
//!
//! Genotypes are pairs of allele indexes. Checks are evaluated in the order
//! mendelian, denovo, omission; whatever none of them explains is `other`.

use super::enums::Inheritance;

pub type GenotypePair = [i8; 2];

fn contains(
    gt: &GenotypePair,
    allele: i8,
) -> bool {
    gt[0] == allele || gt[1] == allele
}

/// The child carries the allele on a haplotype that one parent can pass on
/// while the other haplotype comes from the other parent's side.
pub fn check_mendelian(
    p1: &GenotypePair,
    p2: &GenotypePair,
    ch: &GenotypePair,
    allele: i8,
) -> bool {
    if !contains(ch, allele) {
        return false;
    }
    let from = |c: i8, p: &GenotypePair| c == allele && contains(p, allele);

    let m1 = from(ch[0], p1) || from(ch[1], p2);
    let m2 = from(ch[0], p2) || from(ch[1], p1);
    m1 || m2
}

/// The allele is in the child but in neither parent.
pub fn check_denovo(
    p1: &GenotypePair,
    p2: &GenotypePair,
    ch: &GenotypePair,
    allele: i8,
) -> bool {
    contains(ch, allele) && !contains(p1, allele) && !contains(p2, allele)
}

/// A parent homozygous for the allele did not pass it to the child.
pub fn check_omission(
    p1: &GenotypePair,
    p2: &GenotypePair,
    ch: &GenotypePair,
    allele: i8,
) -> bool {
    if !contains(p1, allele) && !contains(p2, allele) {
        return false;
    }
    if contains(ch, allele) {
        return false;
    }
    let homozygous = |p: &GenotypePair| p[0] == allele && p[1] == allele;
    homozygous(p1) || homozygous(p2)
}

/// Classifies `allele` for the child `ch` of parents `p1` and `p2`.
pub fn classify(
    p1: &GenotypePair,
    p2: &GenotypePair,
    ch: &GenotypePair,
    allele: i8,
) -> Inheritance {
    if check_mendelian(p1, p2, ch, allele) {
        Inheritance::Mendelian
    }
    else if check_denovo(p1, p2, ch, allele) {
        Inheritance::Denovo
    }
    else if check_omission(p1, p2, ch, allele) {
        Inheritance::Omission
    }
    else {
        Inheritance::Other
    }
}
