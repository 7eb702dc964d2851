//! The command catalog: PMBus Part II command summary in numeric order, skipping undefined codes.
//!
//! The list is treated as authoritative configuration data. It has a few known conflicts (a code
//! listed twice under different tags); [`duplicate_codes`] reports them, nothing here resolves them.
//! Lookups return the first matching entry.

use crate::command::{
    APP_PROFILE_SUPPORT, CAPABILITY, CLEAR_FAULT, COEFFICIENTS, CommandFlags, CommandInfo,
    IC_DEVICE_ID, IC_DEVICE_REV, MFR_DATE, MFR_ID, MFR_LOCATION, MFR_MODEL, MFR_REVISION,
    MFR_SERIAL, MFR_SPECIFIC_COMMAND_EXT, PMBUS_COMMAND_EXT, PMBUS_REVISION, QUERY,
    STATUS_BYTE, STATUS_CML, STATUS_FANS_1_2, STATUS_FANS_3_4, STATUS_INPUT, STATUS_IOUT,
    STATUS_MFR_SPECIFIC, STATUS_OTHER, STATUS_TEMPERATURE, STATUS_VOUT, STATUS_WORD,
    TransferShape as T, Unit, VOUT_MODE, mfr_specific, user_data,
};

const SUMMARY: CommandFlags = CommandFlags::SUMMARY;
const STATUS: CommandFlags = CommandFlags::STATUS;
const VOUT: CommandFlags = CommandFlags::VOUT_FORMAT;

const fn rw1(code: u16, tag: &'static str) -> CommandInfo {
    CommandInfo::new(code, tag, T::Byte)
}

const fn rw2(code: u16, tag: &'static str) -> CommandInfo {
    CommandInfo::new(code, tag, T::Word)
}

const fn rwb(code: u16, tag: &'static str) -> CommandInfo {
    CommandInfo::new(code, tag, T::Block)
}

const fn r1(code: u16, tag: &'static str) -> CommandInfo {
    CommandInfo::new(code, tag, T::Byte).read_only()
}

const fn r2(code: u16, tag: &'static str) -> CommandInfo {
    CommandInfo::new(code, tag, T::Word).read_only()
}

const fn w0(code: u16, tag: &'static str) -> CommandInfo {
    CommandInfo::new(code, tag, T::NoData).write_only()
}

const fn w1(code: u16, tag: &'static str) -> CommandInfo {
    CommandInfo::new(code, tag, T::Byte).write_only()
}

const fn string(code: u16, tag: &'static str) -> CommandInfo {
    rwb(code, tag).unit(Unit::String).flags(SUMMARY)
}

const fn mfr(index: u8, tag: &'static str) -> CommandInfo {
    CommandInfo::new(mfr_specific(index), tag, T::Undefined)
}

/// The default catalog, terminated by [`CommandInfo::END`].
pub static CATALOG: &[CommandInfo] = &[
    rw1(0x00, "page"),
    rw1(0x01, "operation"),
    rw1(0x02, "on_off_config"),
    w0(CLEAR_FAULT, "clear_fault"),
    rw1(0x04, "phase"),
    rwb(0x05, "page_plus_write"),
    rwb(0x05, "page_plus_read"),
    rw1(0x10, "write_protect"),
    w0(0x11, "store_default_all"),
    w0(0x12, "restore_default_all"),
    w1(0x13, "store_default_code"),
    w1(0x14, "restore_default_code"),
    w0(0x15, "store_user_all"),
    w0(0x16, "restore_user_all"),
    w1(0x17, "store_user_code"),
    w1(0x18, "restore_user_code"),
    r1(CAPABILITY, "capability").flags(SUMMARY),
    CommandInfo::new(QUERY, "query", T::QueryCall),
    rwb(0x1b, "smbalert_mask"),
    rw1(VOUT_MODE, "vout_mode"),
    rw2(0x21, "vout_command"),
    rw2(0x22, "vout_trim").unit(Unit::Volts),
    rw2(0x23, "vout_cal_offset").unit(Unit::Volts),
    rw2(0x24, "vout_max").unit(Unit::Volts).flags(VOUT),
    rw2(0x25, "vout_margin_high").unit(Unit::Volts).flags(VOUT),
    rw2(0x26, "vout_margin_low").unit(Unit::Volts).flags(VOUT),
    rw2(0x27, "vout_transition_rate"),
    rw2(0x28, "vout_droop"),
    rw2(0x29, "vout_scale_loop"),
    rw2(0x2a, "vout_scale_monitor"),
    CommandInfo::new(COEFFICIENTS, "coefficients", T::CoefficientsCall),
    rw2(0x31, "pout_max").unit(Unit::Watts),
    rw2(0x32, "max_duty"),
    rw2(0x33, "frequency_switch"),
    rw2(0x35, "vin_on").unit(Unit::Volts),
    rw2(0x36, "vin_off").unit(Unit::Volts),
    rw2(0x37, "interleave"),
    rw2(0x38, "iout_cal_gain"),
    rw2(0x39, "iout_cal_offset").unit(Unit::Amperes),
    rw1(0x3a, "fan_config_1_2"),
    rw2(0x3b, "fan_command_1"),
    rw2(0x3c, "fan_command_2"),
    rw1(0x3d, "fan_config_3_4"),
    rw2(0x3e, "fan_command_3"),
    rw2(0x3f, "fan_command_4"),
    rw2(0x40, "vout_ov_fault_limit").unit(Unit::Volts).flags(VOUT),
    rw1(0x41, "vout_ov_fault_response"),
    rw2(0x42, "vout_ov_warn_limit").unit(Unit::Volts).flags(VOUT),
    rw2(0x43, "vout_uv_warn_limit").unit(Unit::Volts).flags(VOUT),
    rw2(0x44, "vout_uv_fault_limit").unit(Unit::Volts).flags(VOUT),
    rw1(0x45, "vout_uv_fault_response"),
    rw2(0x46, "iout_oc_fault_limit").unit(Unit::Amperes),
    rw1(0x47, "iout_oc_fault_response"),
    rw2(0x48, "iout_oc_lv_fault_limit").unit(Unit::Volts).flags(VOUT),
    rw1(0x49, "iout_oc_lv_fault_response"),
    rw2(0x4a, "iout_oc_warn_limit").unit(Unit::Amperes),
    rw2(0x4b, "iout_uc_fault_limit").unit(Unit::Amperes),
    rw1(0x4c, "iout_uc_fault_response"),
    rw2(0x4f, "ot_fault_limit").unit(Unit::DegreesC),
    rw1(0x50, "ot_fault_response"),
    rw2(0x51, "ot_warn_limit").unit(Unit::DegreesC),
    rw2(0x52, "ut_warn_limit").unit(Unit::DegreesC),
    rw2(0x53, "ut_fault_limit").unit(Unit::DegreesC),
    rw1(0x54, "ut_fault_response"),
    rw2(0x55, "vin_ov_fault_limit").unit(Unit::Volts),
    rw1(0x56, "vin_ov_fault_response"),
    rw2(0x57, "vin_ov_warn_limit").unit(Unit::Volts),
    rw2(0x58, "vin_uv_warn_limit").unit(Unit::Volts),
    rw2(0x59, "vin_uv_fault_limit").unit(Unit::Volts),
    rw1(0x5a, "vin_uv_fault_response"),
    rw2(0x5b, "iin_oc_fault_limit").unit(Unit::Amperes),
    rw1(0x5c, "iin_oc_fault_response"),
    rw2(0x5d, "iin_oc_warn_limit").unit(Unit::Amperes),
    rw2(0x5e, "power_good_on").unit(Unit::Volts).flags(VOUT),
    rw2(0x5f, "power_good_off").unit(Unit::Volts).flags(VOUT),
    rw2(0x60, "ton_delay").unit(Unit::Milliseconds),
    rw2(0x61, "ton_rise").unit(Unit::Milliseconds),
    rw2(0x62, "ton_max_fault_limit").unit(Unit::Milliseconds),
    rw1(0x63, "ton_max_fault_response"),
    rw2(0x64, "toff_delay").unit(Unit::Milliseconds),
    rw2(0x65, "toff_fall").unit(Unit::Milliseconds),
    rw2(0x66, "toff_max_warn_limit").unit(Unit::Milliseconds),
    rw2(0x68, "pout_op_fault_limit").unit(Unit::Watts),
    rw1(0x69, "pout_op_fault_response"),
    rw2(0x6a, "pout_op_warn_limit").unit(Unit::Watts),
    rw2(0x6b, "pin_op_warn_limit").unit(Unit::Watts),
    r1(STATUS_BYTE, "status_byte").flags(STATUS),
    r2(STATUS_WORD, "status_word").unit(Unit::Bits).flags(STATUS),
    r1(STATUS_VOUT, "status_vout").flags(STATUS),
    r1(STATUS_IOUT, "status_iout").flags(STATUS),
    r1(STATUS_INPUT, "status_input").flags(STATUS),
    r1(STATUS_TEMPERATURE, "status_temperature").flags(STATUS),
    r1(STATUS_CML, "status_cml").flags(STATUS),
    r1(STATUS_OTHER, "status_other").flags(STATUS),
    r1(STATUS_MFR_SPECIFIC, "status_mfr_specific").flags(STATUS),
    r1(STATUS_FANS_1_2, "status_fans_1_2").flags(STATUS),
    r1(STATUS_FANS_3_4, "status_fans_3_4").flags(STATUS),
    r2(0x88, "read_vin").unit(Unit::Volts),
    r2(0x89, "read_iin").unit(Unit::Amperes),
    r2(0x8a, "read_vcap").unit(Unit::Volts),
    r2(0x8b, "read_vout").unit(Unit::Volts).flags(VOUT),
    r2(0x8c, "read_iout").unit(Unit::Amperes),
    r2(0x8d, "read_temperature_1").unit(Unit::DegreesC),
    r2(0x8e, "read_temperature_2").unit(Unit::DegreesC),
    r2(0x8f, "read_temperature_3").unit(Unit::DegreesC),
    r2(0x90, "read_fan_speed_1"),
    r2(0x91, "read_fan_speed_2"),
    r2(0x92, "read_fan_speed_3"),
    r2(0x93, "read_fan_speed_4"),
    r2(0x94, "read_duty_cycle"),
    r2(0x95, "read_frequency"),
    r2(0x96, "read_pout").unit(Unit::Watts),
    r2(0x97, "read_pin").unit(Unit::Watts),
    r1(PMBUS_REVISION, "pmbus_revision").flags(SUMMARY),
    string(MFR_ID, "mfr_id"),
    string(MFR_MODEL, "mfr_model"),
    string(MFR_REVISION, "mfr_revision"),
    string(MFR_LOCATION, "mfr_location"),
    string(MFR_DATE, "mfr_date"),
    string(MFR_SERIAL, "mfr_serial"),
    CommandInfo::new(APP_PROFILE_SUPPORT, "app_profile_support", T::ProfileBlock).flags(SUMMARY),
    r2(0xa0, "mfr_vin_min").unit(Unit::Volts),
    r2(0xa1, "mfr_vin_max").unit(Unit::Volts),
    r2(0xa2, "mfr_iin_max").unit(Unit::Amperes),
    r2(0xa3, "mfr_pin_max").unit(Unit::Watts),
    r2(0xa4, "mfr_vout_min").unit(Unit::Volts),
    r2(0xa5, "mfr_vout_max").unit(Unit::Volts),
    r2(0xa5, "mfr_iout_max").unit(Unit::Amperes),
    r2(0xa7, "mfr_pout_max").unit(Unit::Watts),
    r2(0xa8, "mfr_tambient_max").unit(Unit::DegreesC),
    r2(0xa9, "mfr_tambient_min").unit(Unit::DegreesC),
    CommandInfo::new(0xaa, "mfr_efficiency_ll", T::Block14),
    CommandInfo::new(0xab, "mfr_efficiency_hl", T::Block14),
    r1(0xac, "mfr_pin_accuracy"),
    string(IC_DEVICE_ID, "ic_device_id"),
    string(IC_DEVICE_REV, "ic_device_rev"),
    rwb(user_data(0), "user_data_00"),
    rwb(user_data(1), "user_data_01"),
    rwb(user_data(2), "user_data_02"),
    rwb(user_data(3), "user_data_03"),
    rwb(user_data(4), "user_data_04"),
    rwb(user_data(5), "user_data_05"),
    rwb(user_data(6), "user_data_06"),
    rwb(user_data(7), "user_data_07"),
    rwb(user_data(8), "user_data_08"),
    rwb(user_data(9), "user_data_09"),
    rwb(user_data(10), "user_data_10"),
    rwb(user_data(11), "user_data_11"),
    rwb(user_data(12), "user_data_12"),
    rwb(user_data(13), "user_data_13"),
    rwb(user_data(14), "user_data_14"),
    rwb(user_data(15), "user_data_15"),
    rw2(0xc0, "mfr_max_temp_1").unit(Unit::DegreesC),
    rw2(0xc1, "mfr_max_temp_1").unit(Unit::DegreesC),
    rw2(0xc2, "mfr_max_temp_1").unit(Unit::DegreesC),
    mfr(0, "mfr_specific_00"),
    mfr(1, "mfr_specific_01"),
    mfr(2, "mfr_specific_02"),
    mfr(3, "mfr_specific_03"),
    mfr(4, "mfr_specific_04"),
    mfr(5, "mfr_specific_05"),
    mfr(6, "mfr_specific_06"),
    mfr(7, "mfr_specific_07"),
    mfr(8, "mfr_specific_08"),
    mfr(9, "mfr_specific_09"),
    mfr(10, "mfr_specific_10"),
    mfr(11, "mfr_specific_11"),
    mfr(12, "mfr_specific_12"),
    mfr(13, "mfr_specific_13"),
    mfr(14, "mfr_specific_14"),
    mfr(15, "mfr_specific_15"),
    mfr(16, "mfr_specific_16"),
    mfr(17, "mfr_specific_17"),
    mfr(18, "mfr_specific_18"),
    mfr(19, "mfr_specific_19"),
    mfr(20, "mfr_specific_20"),
    mfr(21, "mfr_specific_21"),
    mfr(22, "mfr_specific_22"),
    mfr(23, "mfr_specific_23"),
    mfr(24, "mfr_specific_24"),
    mfr(25, "mfr_specific_25"),
    mfr(26, "mfr_specific_26"),
    mfr(27, "mfr_specific_27"),
    // Upstream table lists 0xed twice and never 0xec. Kept as published.
    mfr(29, "mfr_specific_28"),
    mfr(29, "mfr_specific_29"),
    mfr(30, "mfr_specific_30"),
    mfr(31, "mfr_specific_31"),
    mfr(32, "mfr_specific_32"),
    mfr(33, "mfr_specific_33"),
    mfr(34, "mfr_specific_34"),
    mfr(35, "mfr_specific_35"),
    mfr(36, "mfr_specific_36"),
    mfr(37, "mfr_specific_37"),
    mfr(38, "mfr_specific_38"),
    mfr(39, "mfr_specific_39"),
    mfr(40, "mfr_specific_40"),
    mfr(41, "mfr_specific_41"),
    mfr(42, "mfr_specific_42"),
    mfr(43, "mfr_specific_43"),
    mfr(44, "mfr_specific_44"),
    mfr(45, "mfr_specific_45"),
    CommandInfo::new(MFR_SPECIFIC_COMMAND_EXT, "mfr_specific_command_ext", T::Undefined),
    CommandInfo::new(PMBUS_COMMAND_EXT, "pmbus_command_ext", T::Undefined),
    CommandInfo::END,
];

/// Iterate the entries of a catalog, stopping at the terminator (or the end of the slice).
pub fn entries(catalog: &[CommandInfo]) -> impl Iterator<Item = &CommandInfo> {
    catalog.iter().take_while(|info| !info.is_end())
}

/// First entry with the given code. Linear scan.
pub fn find(catalog: &[CommandInfo], code: u16) -> Option<&CommandInfo> {
    entries(catalog).find(|info| info.code == code)
}

/// Codes that appear more than once, each reported once, with the first and the conflicting tag.
pub fn duplicate_codes(
    catalog: &[CommandInfo],
) -> impl Iterator<Item = (u16, &'static str, &'static str)> + '_ {
    entries(catalog).enumerate().filter_map(move |(index, info)| {
        let first = entries(catalog).position(|other| other.code == info.code)?;
        if first == index {
            return None;
        }
        let first_tag = catalog[first].tag;
        Some((info.code, first_tag, info.tag))
    })
}
