//! # Command Encoder
//!
//! Builds outbound command frames from opcodes.

use super::wire::{Opcode, COMMAND_FRAME_SIZE};

/// Encode an opcode into a complete command frame
///
/// Frame layout is `[opcode][terminator0][terminator1]`; the boards
/// expect the same terminator on commands that they put on responses.
///
/// # Examples
///
/// ```
/// use avionics_bench::protocol::encoder::encode_command;
/// use avionics_bench::protocol::wire::{Opcode, DEFAULT_TERMINATOR};
///
/// let frame = encode_command(Opcode::EnterInspect, DEFAULT_TERMINATOR);
/// assert_eq!(frame, [0x01, b'\r', b'\n']);
/// ```
pub fn encode_command(opcode: Opcode, terminator: [u8; 2]) -> [u8; COMMAND_FRAME_SIZE] {
    [opcode.byte(), terminator[0], terminator[1]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decoder::decode_ack;
    use crate::protocol::wire::DEFAULT_TERMINATOR;

    #[test]
    fn test_encode_command_layout() {
        let frame = encode_command(Opcode::GetAnalogSdUpdate, DEFAULT_TERMINATOR);
        assert_eq!(frame.len(), COMMAND_FRAME_SIZE);
        assert_eq!(frame[0], 0xA0);
        assert_eq!(&frame[1..], b"\r\n");
    }

    #[test]
    fn test_encode_command_custom_terminator() {
        let frame = encode_command(Opcode::EnterNormal, [0x1F, b'\n']);
        assert_eq!(frame, [0x00, 0x1F, b'\n']);
    }

    #[test]
    fn test_ack_round_trips_for_all_opcodes() {
        let opcodes = [
            Opcode::EnterNormal,
            Opcode::EnterInspect,
            Opcode::EnterLaunch,
            Opcode::GetAnalogSdUpdate,
            Opcode::GetAnalogLcReading,
            Opcode::ClearAnalogSd,
            Opcode::GetRadioSdUpdate,
            Opcode::ClearRadioSd,
            Opcode::GetDigitalSdUpdate,
            Opcode::GetShock1Reading,
            Opcode::GetShock2Reading,
            Opcode::GetImuReading,
            Opcode::GetAltimeterReading,
            Opcode::ClearDigitalSd,
        ];

        for opcode in opcodes {
            let frame = encode_command(opcode, DEFAULT_TERMINATOR);
            assert_eq!(decode_ack(&frame).unwrap(), opcode.byte());
        }
    }
}
