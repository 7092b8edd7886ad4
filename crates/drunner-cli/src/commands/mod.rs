pub mod backup;
pub mod completions;
pub mod install;
pub mod list;
pub mod obliterate;
pub mod recover;
pub mod restore;
pub mod servicecmd;
pub mod uninstall;
pub mod update;

use drunner_core::OpResult;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
/// The operation ran but nothing needed doing; scripts can branch on this.
pub const EXIT_NO_CHANGE: u8 = 3;

pub fn exit_code(result: OpResult) -> u8 {
    match result {
        OpResult::Success => EXIT_SUCCESS,
        OpResult::NoChange => EXIT_NO_CHANGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_change_maps_to_distinct_code() {
        assert_eq!(exit_code(OpResult::Success), EXIT_SUCCESS);
        assert_eq!(exit_code(OpResult::NoChange), EXIT_NO_CHANGE);
        assert_ne!(EXIT_NO_CHANGE, EXIT_FAILURE);
    }
}
