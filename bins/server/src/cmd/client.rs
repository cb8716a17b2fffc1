use log_client::LogClient;

use crate::config::{ConsumeArgs, ProduceArgs, ProduceStreamArgs};
use crate::error::ServerError;

pub async fn produce(args: ProduceArgs) -> Result<(), ServerError> {
    let client = LogClient::new(args.client.addr);
    let position = client.produce(args.value).await?;
    println!("position: {position}");
    Ok(())
}

pub async fn consume(args: ConsumeArgs) -> Result<(), ServerError> {
    let client = LogClient::new(args.client.addr);
    let record = client.consume(args.position).await?;
    println!("value: {}", record.value_lossy());
    println!("position: {}", record.position);
    Ok(())
}

pub async fn produce_stream(args: ProduceStreamArgs) -> Result<(), ServerError> {
    let client = LogClient::new(args.client.addr);
    let mut stream = client.produce_stream().await?;

    println!("positions:");
    for value in args.values {
        stream.send(value).await?;
        let position = stream.recv().await?;
        println!("\t- {position}");
    }
    stream.close().await?;
    Ok(())
}

pub async fn consume_stream(args: ConsumeArgs) -> Result<(), ServerError> {
    let client = LogClient::new(args.client.addr);
    let mut stream = client.consume_stream(args.position).await?;

    println!("values:");
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            next = stream.next() => match next {
                Some(record) => {
                    let record = record?;
                    println!("\t- {} ({})", record.value_lossy(), record.position);
                }
                None => {
                    tracing::info!("stream closed by server");
                    return Ok(());
                }
            }
        }
    }
    stream.close().await?;
    Ok(())
}
