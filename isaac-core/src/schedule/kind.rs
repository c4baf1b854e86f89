/// The seven kernel kinds a root can be classified into (§4.2), ordered by
/// the lattice of decreasing kernel complexity:
/// `MATRIX_PRODUCT_* > REDUCE_2D_{ROWS,COLS} > REDUCE_1D > ELEMENTWISE_2D >
/// ELEMENTWISE_1D`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    ElementWise1D,
    ElementWise2D,
    Reduce1D,
    Reduce2DRows,
    Reduce2DCols,
    MatrixProductNN,
    MatrixProductNT,
    MatrixProductTN,
    MatrixProductTT,
}

impl Kind {
    pub fn rank(self) -> u8 {
        match self {
            Kind::ElementWise1D => 0,
            Kind::ElementWise2D => 1,
            Kind::Reduce1D => 2,
            Kind::Reduce2DRows | Kind::Reduce2DCols => 3,
            Kind::MatrixProductNN | Kind::MatrixProductNT | Kind::MatrixProductTN | Kind::MatrixProductTT => 4,
        }
    }

    pub fn is_elementwise(self) -> bool {
        matches!(self, Kind::ElementWise1D | Kind::ElementWise2D)
    }

    pub fn is_reduction(self) -> bool {
        matches!(self, Kind::Reduce1D | Kind::Reduce2DRows | Kind::Reduce2DCols)
    }

    pub fn is_matrix_product(self) -> bool {
        self.rank() == 4
    }

    /// The greater of two kinds under the lattice; ties favor `a`.
    pub fn greater(a: Kind, b: Kind) -> Kind {
        if b.rank() > a.rank() {
            b
        } else {
            a
        }
    }

    pub fn from_shape(shape: &isaac_types::Shape) -> Kind {
        if shape.non_unit_axes() <= 1 {
            Kind::ElementWise1D
        } else {
            Kind::ElementWise2D
        }
    }

    pub fn matrix_product(a_trans: bool, b_trans: bool) -> Kind {
        match (a_trans, b_trans) {
            (false, false) => Kind::MatrixProductNN,
            (false, true) => Kind::MatrixProductNT,
            (true, false) => Kind::MatrixProductTN,
            (true, true) => Kind::MatrixProductTT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_lattice_is_strictly_increasing_across_groups() {
        assert!(Kind::ElementWise1D.rank() < Kind::ElementWise2D.rank());
        assert!(Kind::ElementWise2D.rank() < Kind::Reduce1D.rank());
        assert!(Kind::Reduce1D.rank() < Kind::Reduce2DRows.rank());
        assert_eq!(Kind::Reduce2DRows.rank(), Kind::Reduce2DCols.rank());
        assert!(Kind::Reduce2DCols.rank() < Kind::MatrixProductNN.rank());
    }

    #[test]
    fn greater_ties_favor_a() {
        assert_eq!(Kind::greater(Kind::ElementWise1D, Kind::ElementWise1D), Kind::ElementWise1D);
        assert_eq!(Kind::greater(Kind::Reduce1D, Kind::ElementWise1D), Kind::Reduce1D);
        assert_eq!(Kind::greater(Kind::ElementWise1D, Kind::Reduce1D), Kind::Reduce1D);
    }

    #[test]
    fn from_shape_picks_1d_for_vectors_and_2d_for_matrices() {
        assert_eq!(Kind::from_shape(&isaac_types::Shape::new(vec![64])), Kind::ElementWise1D);
        assert_eq!(Kind::from_shape(&isaac_types::Shape::new(vec![1, 64])), Kind::ElementWise1D);
        assert_eq!(Kind::from_shape(&isaac_types::Shape::new(vec![8, 8])), Kind::ElementWise2D);
    }

    #[test]
    fn matrix_product_selects_variant_by_transpose_flags() {
        assert_eq!(Kind::matrix_product(false, false), Kind::MatrixProductNN);
        assert_eq!(Kind::matrix_product(false, true), Kind::MatrixProductNT);
        assert_eq!(Kind::matrix_product(true, false), Kind::MatrixProductTN);
        assert_eq!(Kind::matrix_product(true, true), Kind::MatrixProductTT);
    }

    #[test]
    fn predicate_helpers_partition_the_kinds() {
        assert!(Kind::ElementWise1D.is_elementwise());
        assert!(!Kind::ElementWise1D.is_reduction());
        assert!(Kind::Reduce2DRows.is_reduction());
        assert!(!Kind::Reduce2DRows.is_elementwise());
        assert!(Kind::MatrixProductTT.is_matrix_product());
        assert!(!Kind::Reduce1D.is_matrix_product());
    }
}
