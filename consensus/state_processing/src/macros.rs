/// Bail out of an operation-verification function with the given invalid
/// reason, wrapped in `BlockOperationError::Invalid`.
macro_rules! verify {
    ($condition: expr, $result: expr) => {
        if !$condition {
            return Err(crate::per_block_processing::errors::BlockOperationError::invalid(
                $result,
            ));
        }
    };
}

/// Bail out of a block-processing function with the given
/// `BlockProcessingError`.
macro_rules! block_verify {
    ($condition: expr, $result: expr) => {
        if !$condition {
            return Err($result);
        }
    };
}
