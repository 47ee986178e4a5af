use futures_util::StreamExt;
use seqlink_engine::Transceiver;
use seqlink_frame::SeqFactory;

use crate::cmd::ListenArgs;
use crate::exit::{io_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_body, BodyKind, OutputFormat, Printed};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let stream = args
        .endpoint
        .connect()
        .await
        .map_err(|err| transport_error("connect failed", err))?;

    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let mut pushes = transceiver.listen();
    let endpoint = args.endpoint.to_string();
    let mut printed = 0usize;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                tracing::info!(printed, "interrupted");
                return Ok(SUCCESS);
            }
            push = pushes.next() => {
                let Some(body) = push else {
                    tracing::info!(printed, "device disconnected");
                    return Ok(SUCCESS);
                };

                print_body(
                    &Printed {
                        kind: BodyKind::Push,
                        endpoint: &endpoint,
                        body: &body,
                        elapsed_ms: None,
                    },
                    format,
                );
                printed = printed.saturating_add(1);

                if let Some(count) = args.count {
                    if printed >= count {
                        return Ok(SUCCESS);
                    }
                }
            }
        }
    }
}
