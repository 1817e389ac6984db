use cloudhawk_frame::{decode_frame, encode_command, CommandCode};

use crate::cmd::{parse_hex, DecodeArgs, EncodeArgs};
use crate::exit::{frame_error, unknown_command, CliResult, SUCCESS};
use crate::output::{print_encoded, print_frame, OutputFormat};

pub fn encode(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let command: CommandCode = args.command.parse().map_err(unknown_command)?;
    let payload = match &args.payload {
        Some(hex) => parse_hex(hex)?,
        None => Vec::new(),
    };

    let frame =
        encode_command(command, &payload).map_err(|err| frame_error("encode failed", err))?;
    print_encoded(command.name(), &frame, format);
    Ok(SUCCESS)
}

pub fn decode(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = parse_hex(&args.frame)?;
    let frame = decode_frame(raw).map_err(|err| frame_error("decode failed", err))?;
    print_frame(&frame, format);
    Ok(SUCCESS)
}
